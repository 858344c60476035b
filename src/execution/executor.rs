use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::models::{Balance, OrderRequest, OrderResult, OrderSide, OrderType};

/// Order execution collaborator
///
/// Implemented by the live exchange client and by the paper executor.
/// Errors are returned to the caller; nothing here mutates trading state.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult, ExecutionError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecutionError>;

    async fn get_balance(&self) -> Result<Balance, ExecutionError>;

    /// Signed size of the exchange position in base units, zero when flat
    async fn get_position_size(&self) -> Result<f64, ExecutionError>;
}

#[async_trait]
impl<T: ExecutionClient + ?Sized> ExecutionClient for Arc<T> {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult, ExecutionError> {
        (**self).place_order(order).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecutionError> {
        (**self).cancel_order(order_id).await
    }

    async fn get_balance(&self) -> Result<Balance, ExecutionError> {
        (**self).get_balance().await
    }

    async fn get_position_size(&self) -> Result<f64, ExecutionError> {
        (**self).get_position_size().await
    }
}

#[derive(Debug, Default)]
struct PaperBook {
    placed: Vec<(String, OrderRequest)>,
    cancelled: Vec<String>,
    /// Net filled size; resting stop orders never fill
    net_size: f64,
}

/// Simulated executor: accepts every order and fills it immediately
///
/// Used for `--paper` runs and the backtest harness.
#[derive(Debug, Clone)]
pub struct PaperExecutor {
    balance: f64,
    book: Arc<Mutex<PaperBook>>,
}

impl PaperExecutor {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            book: Arc::new(Mutex::new(PaperBook::default())),
        }
    }

    /// Orders accepted so far, oldest first
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.book
            .lock()
            .map(|book| book.placed.iter().map(|(_, o)| o.clone()).collect())
            .unwrap_or_default()
    }

    pub fn cancelled_orders(&self) -> Vec<String> {
        self.book
            .lock()
            .map(|book| book.cancelled.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionClient for PaperExecutor {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult, ExecutionError> {
        if !(order.size.is_finite() && order.size > 0.0) {
            return Err(ExecutionError::InvalidOrder(format!("size {}", order.size)));
        }

        let order_id = format!("paper-{}", Uuid::new_v4());
        tracing::info!(
            "📝 PAPER {} {:?} size={:.6} stop={:?} reduce_only={}",
            order.side.as_str(),
            order.order_type,
            order.size,
            order.stop_price,
            order.reduce_only
        );

        let mut book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Decode("paper book poisoned".to_string()))?;
        if order.order_type == OrderType::Market {
            book.net_size += match order.side {
                OrderSide::Buy => order.size,
                OrderSide::Sell => -order.size,
            };
        }
        book.placed.push((order_id.clone(), order.clone()));

        Ok(OrderResult {
            order_id,
            client_order_id: None,
            state: "closed".to_string(),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecutionError> {
        let mut book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Decode("paper book poisoned".to_string()))?;
        book.cancelled.push(order_id.to_string());
        Ok(())
    }

    async fn get_balance(&self) -> Result<Balance, ExecutionError> {
        Ok(Balance {
            available: self.balance,
        })
    }

    async fn get_position_size(&self) -> Result<f64, ExecutionError> {
        let book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Decode("paper book poisoned".to_string()))?;
        Ok(book.net_size)
    }
}
