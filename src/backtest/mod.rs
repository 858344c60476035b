pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{BacktestMetrics, TradeRecord};
pub use runner::{intrabar_ticks, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
