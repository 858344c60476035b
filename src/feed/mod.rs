// Market data stream: wire format, liveness tracking and the reconnect loop
pub mod bar;
pub mod heartbeat;
pub mod messages;
pub mod supervisor;

pub use bar::{BarUpdate, FormingBar};
pub use heartbeat::{HealthAction, HeartbeatMonitor};
pub use messages::{parse_frame, FeedEvent};
pub use supervisor::{ConnectionState, FeedHandler, StreamSupervisor, SupervisorConfig};
