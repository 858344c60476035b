use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::api::DeltaConfig;
use crate::engine::EngineConfig;
use crate::error::Error;
use crate::execution::RiskConfig;
use crate::feed::SupervisorConfig;
use crate::indicators::IndicatorSettings;
use crate::strategy::SignalConfig;

const DEFAULT_CONFIG_FILE: &str = "Settings";
const ENV_PREFIX: &str = "OBTRADER";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub rest_url: String,
    pub ws_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub symbol: String,
    pub product_id: u64,
    pub settlement_asset_id: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://api.india.delta.exchange".to_string(),
            ws_url: "wss://socket.india.delta.exchange".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            symbol: "ETHUSD".to_string(),
            product_id: 1699,
            settlement_asset_id: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub timeframe: String,
    pub initial_capital: f64,
    pub stop_loss_pct: f64,
    pub trailing_stop_pct: f64,
    /// Base units per exchange contract (0.01 ETH on ETHUSD)
    pub contract_size: f64,
    pub size_step: u64,
    /// Rough instrument price for the startup sizing check
    pub reference_price: f64,
    pub paper: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            timeframe: "15m".to_string(),
            initial_capital: 100.0,
            stop_loss_pct: 0.02,
            trailing_stop_pct: 0.015,
            contract_size: 0.01,
            size_step: 1,
            reference_price: 2000.0,
            paper: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub sensitivity: f64,
    pub min_volume_percentile: f64,
    pub trend_period: usize,
    pub min_trades_distance: u64,
    pub volatility_multiplier: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let signal = SignalConfig::default();
        Self {
            sensitivity: signal.sensitivity,
            min_volume_percentile: signal.min_volume_percentile,
            trend_period: IndicatorSettings::default().trend_period,
            min_trades_distance: signal.min_trades_distance,
            volatility_multiplier: signal.volatility_multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub heartbeat_timeout_secs: u64,
    pub pong_timeout_secs: u64,
    pub reconnect_backoff_secs: u64,
    pub health_check_interval_secs: u64,
    pub window_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            pong_timeout_secs: 10,
            reconnect_backoff_secs: 5,
            health_check_interval_secs: 5,
            window_capacity: crate::execution::DEFAULT_WINDOW_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Layered application settings: `Settings.toml`, then `OBTRADER__*` env vars
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub strategy: StrategyConfig,
    pub feed: FeedConfig,
    pub telegram: Option<TelegramConfig>,
}

impl AppConfig {
    /// Load from an optional file and the environment
    ///
    /// An explicit `path` must exist; the default `Settings` file is optional.
    pub fn load(path: Option<&str>) -> crate::Result<Self> {
        let file = File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some());

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn from_toml(text: &str) -> crate::Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings::default().with_trend_period(self.strategy.trend_period)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.trading.initial_capital,
            window_capacity: self.feed.window_capacity,
            indicators: self.indicator_settings(),
            signal: SignalConfig {
                sensitivity: self.strategy.sensitivity,
                min_volume_percentile: self.strategy.min_volume_percentile,
                min_trades_distance: self.strategy.min_trades_distance,
                volatility_multiplier: self.strategy.volatility_multiplier,
            },
            risk: RiskConfig {
                stop_loss_pct: self.trading.stop_loss_pct,
                trailing_stop_pct: self.trading.trailing_stop_pct,
            },
        }
    }

    pub fn delta_config(&self) -> DeltaConfig {
        DeltaConfig {
            base_url: self.exchange.rest_url.clone(),
            api_key: self.exchange.api_key.clone(),
            api_secret: self.exchange.api_secret.clone(),
            product_id: self.exchange.product_id,
            settlement_asset_id: self.exchange.settlement_asset_id,
            contract_size: self.trading.contract_size,
            size_step: self.trading.size_step,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            url: self.exchange.ws_url.clone(),
            symbol: self.exchange.symbol.clone(),
            timeframe: self.trading.timeframe.clone(),
            heartbeat_timeout: Duration::from_secs(self.feed.heartbeat_timeout_secs),
            pong_timeout: Duration::from_secs(self.feed.pong_timeout_secs),
            reconnect_backoff: Duration::from_secs(self.feed.reconnect_backoff_secs),
            health_check_interval: Duration::from_secs(self.feed.health_check_interval_secs),
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        let fraction = |v: f64| v > 0.0 && v < 1.0;

        if self.exchange.symbol.trim().is_empty() {
            return invalid("exchange.symbol is empty".to_string());
        }
        if !self.trading.paper && (self.exchange.api_key.is_empty() || self.exchange.api_secret.is_empty()) {
            return invalid("exchange.api_key and exchange.api_secret are required for live trading".to_string());
        }
        if self.trading.timeframe.trim().is_empty() {
            return invalid("trading.timeframe is empty".to_string());
        }
        if !(self.trading.initial_capital.is_finite() && self.trading.initial_capital > 0.0) {
            return invalid(format!("trading.initial_capital must be positive, got {}", self.trading.initial_capital));
        }
        if !fraction(self.trading.stop_loss_pct) {
            return invalid(format!("trading.stop_loss_pct must be in (0, 1), got {}", self.trading.stop_loss_pct));
        }
        if !fraction(self.trading.trailing_stop_pct) {
            return invalid(format!(
                "trading.trailing_stop_pct must be in (0, 1), got {}",
                self.trading.trailing_stop_pct
            ));
        }
        if self.trading.contract_size <= 0.0 || self.trading.size_step == 0 {
            return invalid("trading.contract_size and trading.size_step must be positive".to_string());
        }
        if !self.trading.paper {
            // Live orders are rounded down to whole contracts
            let smallest = self.trading.contract_size * self.trading.size_step as f64;
            if !(self.trading.reference_price.is_finite() && self.trading.reference_price > 0.0) {
                return invalid("trading.reference_price must be positive".to_string());
            }
            let affordable = self.trading.initial_capital / self.trading.reference_price;
            if affordable < smallest {
                return invalid(format!(
                    "trading.initial_capital {} buys {:.6} units at {}, below one order of {} units",
                    self.trading.initial_capital, affordable, self.trading.reference_price, smallest
                ));
            }
        }
        if !fraction(self.strategy.sensitivity) {
            return invalid(format!("strategy.sensitivity must be in (0, 1), got {}", self.strategy.sensitivity));
        }
        if !(0.0..=100.0).contains(&self.strategy.min_volume_percentile) {
            return invalid(format!(
                "strategy.min_volume_percentile must be within 0-100, got {}",
                self.strategy.min_volume_percentile
            ));
        }
        if self.strategy.trend_period == 0 {
            return invalid("strategy.trend_period must be positive".to_string());
        }
        if self.strategy.volatility_multiplier <= 0.0 {
            return invalid("strategy.volatility_multiplier must be positive".to_string());
        }

        let warmup = self.indicator_settings().warmup_candles();
        if self.feed.window_capacity < warmup {
            return invalid(format!(
                "feed.window_capacity {} is below the {} candles indicators need",
                self.feed.window_capacity, warmup
            ));
        }
        if self.feed.heartbeat_timeout_secs == 0
            || self.feed.pong_timeout_secs == 0
            || self.feed.health_check_interval_secs == 0
        {
            return invalid("feed timeouts and intervals must be positive".to_string());
        }

        Ok(())
    }
}
