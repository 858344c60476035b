// Order execution and position state module
pub mod candle_window;
pub mod executor;
pub mod position_manager;

pub use candle_window::{CandleWindow, DEFAULT_WINDOW_CAPACITY};
pub use executor::{ExecutionClient, PaperExecutor};
pub use position_manager::{
    ClosedTrade, ExitReason, Position, RiskConfig, TickOutcome, TradeStats, TradingState,
};
