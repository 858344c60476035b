// Trading strategy module
pub mod order_block;

pub use order_block::{Detection, RejectReason, SignalConfig, SignalDetector};
