use chrono::{DateTime, Utc};
use thiserror::Error;

/// Candle window rejections
#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("out-of-order candle: {received} is not after {last}")]
    OutOfOrderCandle {
        last: DateTime<Utc>,
        received: DateTime<Utc>,
    },
}

/// Failures reported by the order-execution collaborator
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Invariant violations inside the position state machine
#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("a {0} position is already open")]
    AlreadyOpen(crate::models::Side),

    #[error("no open position to close")]
    NotOpen,

    #[error("invalid entry price {0}")]
    InvalidPrice(f64),
}

/// Stream supervisor failures
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("connection unhealthy: {0}")]
    Unhealthy(String),

    #[error("event handler failed: {0}")]
    Handler(#[from] Box<Error>),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
