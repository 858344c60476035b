// Core modules
pub mod api;
pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod strategy;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use engine::{EngineConfig, TradingEngine};
pub use models::*;

// Error handling
pub use error::{Error, Result};
