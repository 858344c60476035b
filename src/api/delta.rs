use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::execution::ExecutionClient;
use crate::models::{Balance, OrderRequest, OrderResult, OrderType};

const DELTA_API_BASE: &str = "https://api.india.delta.exchange";
const ORDERS_PATH: &str = "/v2/orders";
const BALANCES_PATH: &str = "/v2/wallet/balances";
const POSITIONS_PATH: &str = "/v2/positions";
const USER_AGENT: &str = "obtrader";

type HmacSha256 = Hmac<Sha256>;

/// Connection and instrument settings for the Delta Exchange REST API
#[derive(Debug, Clone)]
pub struct DeltaConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub product_id: u64,
    /// Asset whose balance backs the traded contract (3 = USDT)
    pub settlement_asset_id: u64,
    /// Base units per contract (0.01 ETH for ETHUSD)
    pub contract_size: f64,
    /// Contract granularity; sizes are rounded down to a multiple of this
    pub size_step: u64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            base_url: DELTA_API_BASE.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            product_id: 1699,
            settlement_asset_id: 3,
            contract_size: 0.01,
            size_step: 1,
        }
    }
}

/// Signed REST client for order placement and balances
#[derive(Clone)]
pub struct DeltaClient {
    client: Client,
    config: DeltaConfig,
}

#[derive(Debug, Serialize)]
struct PlaceOrderBody {
    product_id: u64,
    size: i64,
    side: &'static str,
    order_type: &'static str,
    time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_order_type: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reduce_only: bool,
    client_order_id: String,
}

#[derive(Debug, Serialize)]
struct CancelOrderBody<'a> {
    id: &'a str,
    product_id: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: serde_json::Value,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    /// Signed contract count, sent as a number or a string
    #[serde(default)]
    size: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WalletBalance {
    asset_id: u64,
    available_balance: String,
}

/// Bytes covered by the request signature
pub fn signature_payload(method: &str, timestamp: &str, path: &str, query: &str, body: &str) -> String {
    format!("{}{}{}{}{}", method, timestamp, path, query, body)
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed with the API secret
pub fn sign(secret: &str, payload: &str) -> Result<String, ExecutionError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExecutionError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl DeltaClient {
    pub fn new(config: DeltaConfig) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DeltaConfig {
        &self.config
    }

    /// Convert a base-unit size into whole contracts, rounded down to `size_step`
    pub fn contracts_for(&self, size: f64) -> Result<i64, ExecutionError> {
        let invalid = || ExecutionError::InvalidOrder(format!("size {} is not representable", size));

        let size = Decimal::try_from(size).map_err(|_| invalid())?;
        let contract_size = Decimal::try_from(self.config.contract_size).map_err(|_| invalid())?;
        if contract_size <= Decimal::ZERO {
            return Err(ExecutionError::InvalidOrder("contract size must be positive".to_string()));
        }
        let step = Decimal::from(self.config.size_step.max(1));

        let contracts = ((size / contract_size) / step).floor() * step;
        let contracts = contracts.to_i64().ok_or_else(invalid)?;
        if contracts <= 0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "size {} rounds to zero contracts",
                size
            )));
        }
        Ok(contracts)
    }

    fn build_order_body(&self, order: &OrderRequest) -> Result<PlaceOrderBody, ExecutionError> {
        let size = self.contracts_for(order.size)?;

        let (order_type, time_in_force) = match order.order_type {
            OrderType::Limit => ("limit_order", "gtc"),
            OrderType::Market | OrderType::StopMarket => ("market_order", "ioc"),
        };

        let stop_price = match order.order_type {
            OrderType::StopMarket => Some(order.stop_price.ok_or_else(|| {
                ExecutionError::InvalidOrder("stop order without stop price".to_string())
            })?),
            _ => order.stop_price,
        };

        let limit_price = match order.order_type {
            OrderType::Limit => Some(order.price.ok_or_else(|| {
                ExecutionError::InvalidOrder("limit order without price".to_string())
            })?),
            _ => None,
        };

        Ok(PlaceOrderBody {
            product_id: self.config.product_id,
            size,
            side: order.side.as_str(),
            order_type,
            time_in_force,
            limit_price: limit_price.map(|p| p.to_string()),
            stop_price: stop_price.map(|p| p.to_string()),
            stop_order_type: stop_price.map(|_| "stop_loss_order"),
            reduce_only: order.reduce_only,
            client_order_id: Uuid::new_v4().to_string(),
        })
    }

    /// Send a signed request and return the raw response body
    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<String>,
    ) -> Result<String, ExecutionError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let body = body.unwrap_or_default();
        let payload = signature_payload(method.as_str(), &timestamp, path, query, &body);
        let signature = sign(&self.config.api_secret, &payload)?;

        let url = format!("{}{}{}", self.config.base_url.trim_end_matches('/'), path, query);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("api-key", &self.config.api_key)
            .header("timestamp", &timestamp)
            .header("signature", signature)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExecutionError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl ExecutionClient for DeltaClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult, ExecutionError> {
        let body = self.build_order_body(order)?;
        let json = serde_json::to_string(&body).map_err(|e| ExecutionError::Decode(e.to_string()))?;

        let text = self.signed_request(Method::POST, ORDERS_PATH, "", Some(json)).await?;
        let envelope: Envelope<OrderResponse> =
            serde_json::from_str(&text).map_err(|e| ExecutionError::Decode(e.to_string()))?;

        let result = match envelope.result {
            Some(result) if envelope.success => result,
            _ => return Err(ExecutionError::Decode(format!("order not acknowledged: {}", text))),
        };

        let order_id = match result.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        tracing::info!(
            order_id = %order_id,
            side = body.side,
            size = body.size,
            "Order placed"
        );

        Ok(OrderResult {
            order_id,
            client_order_id: result.client_order_id.or(Some(body.client_order_id)),
            state: result.state.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecutionError> {
        let body = CancelOrderBody {
            id: order_id,
            product_id: self.config.product_id,
        };
        let json = serde_json::to_string(&body).map_err(|e| ExecutionError::Decode(e.to_string()))?;

        self.signed_request(Method::DELETE, ORDERS_PATH, "", Some(json)).await?;
        tracing::info!(order_id, "Order cancelled");
        Ok(())
    }

    async fn get_balance(&self) -> Result<Balance, ExecutionError> {
        let text = self.signed_request(Method::GET, BALANCES_PATH, "", None).await?;
        let envelope: Envelope<Vec<WalletBalance>> =
            serde_json::from_str(&text).map_err(|e| ExecutionError::Decode(e.to_string()))?;

        let balance = envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .find(|b| b.asset_id == self.config.settlement_asset_id)
            .ok_or_else(|| {
                ExecutionError::Decode(format!(
                    "no balance for asset {}",
                    self.config.settlement_asset_id
                ))
            })?;

        let available = balance
            .available_balance
            .parse::<f64>()
            .map_err(|e| ExecutionError::Decode(e.to_string()))?;

        Ok(Balance { available })
    }

    async fn get_position_size(&self) -> Result<f64, ExecutionError> {
        let query = format!("?product_id={}", self.config.product_id);
        let text = self.signed_request(Method::GET, POSITIONS_PATH, &query, None).await?;
        let envelope: Envelope<PositionResponse> =
            serde_json::from_str(&text).map_err(|e| ExecutionError::Decode(e.to_string()))?;

        // An empty result means no position
        let contracts = match envelope.result.map(|p| p.size) {
            None | Some(serde_json::Value::Null) => 0,
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(serde_json::Value::String(s)) => s
                .parse::<i64>()
                .map_err(|e| ExecutionError::Decode(format!("position size {}: {}", s, e)))?,
            Some(other) => return Err(ExecutionError::Decode(format!("position size {}", other))),
        };

        Ok(contracts as f64 * self.config.contract_size)
    }
}
