//! Wire format of the exchange market-data socket
//!
//! Inbound frames are JSON objects tagged by `type`. Candle and ticker
//! payloads may carry numbers either as JSON numbers or as decimal strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FeedError;
use crate::models::{Candle, Ticker};

/// Name of the ticker channel
pub const TICKER_CHANNEL: &str = "v2/ticker";

/// Candle channel for a timeframe such as `15m`
pub fn candle_channel(timeframe: &str) -> String {
    format!("candlestick_{}", timeframe)
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Candle(Candle),
    Tick(Ticker),
    Ping,
    Pong,
    /// Subscription acknowledgements and any other recognised-but-unused type
    Other(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Accepts epoch seconds, milliseconds or microseconds
fn flexible_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n as i64,
        NumberOrString::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom)?,
    };
    epoch_to_datetime(raw).ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", raw)))
}

fn epoch_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    if raw.abs() >= 100_000_000_000_000 {
        DateTime::from_timestamp_micros(raw)
    } else if raw.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

#[derive(Debug, Deserialize)]
struct CandlePayload {
    #[serde(alias = "candle_start_time", deserialize_with = "flexible_timestamp")]
    time: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_f64")]
    open: f64,
    #[serde(deserialize_with = "flexible_f64")]
    high: f64,
    #[serde(deserialize_with = "flexible_f64")]
    low: f64,
    #[serde(deserialize_with = "flexible_f64")]
    close: f64,
    #[serde(deserialize_with = "flexible_f64")]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TickerPayload {
    #[serde(deserialize_with = "flexible_f64")]
    mark_price: f64,
    #[serde(default)]
    symbol: Option<String>,
}

/// Parse one text frame
///
/// The body is read from `payload` when present, otherwise from the frame
/// itself. Unknown types are returned as `Other`, never as errors.
pub fn parse_frame(text: &str) -> Result<FeedEvent, FeedError> {
    let frame: Value = serde_json::from_str(text)?;
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let body = frame.get("payload").cloned().unwrap_or_else(|| frame.clone());

    let event = match kind.as_str() {
        "ping" => FeedEvent::Ping,
        "pong" => FeedEvent::Pong,
        k if k == "candlestick" || k.starts_with("candlestick_") => {
            let payload: CandlePayload = serde_json::from_value(body)?;
            FeedEvent::Candle(Candle {
                timestamp: payload.time,
                open: payload.open,
                high: payload.high,
                low: payload.low,
                close: payload.close,
                volume: payload.volume,
            })
        }
        "ticker" | TICKER_CHANNEL => {
            let payload: TickerPayload = serde_json::from_value(body)?;
            let symbol = payload
                .symbol
                .or_else(|| frame.get("symbol").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            FeedEvent::Tick(Ticker {
                symbol,
                mark_price: payload.mark_price,
                timestamp: Utc::now(),
            })
        }
        _ => FeedEvent::Other(kind),
    };

    Ok(event)
}

#[derive(Debug, Serialize)]
struct ChannelSpec<'a> {
    name: &'a str,
    symbols: &'a [String],
}

#[derive(Debug, Serialize)]
struct SubscribePayload<'a> {
    channels: Vec<ChannelSpec<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Outbound<'a> {
    Subscribe { payload: SubscribePayload<'a> },
    Ping,
    Pong,
}

fn encode(message: &Outbound<'_>) -> String {
    // Serializing these plain structs cannot fail
    serde_json::to_string(message).unwrap_or_default()
}

pub fn subscribe_message(channel: &str, symbols: &[String]) -> String {
    encode(&Outbound::Subscribe {
        payload: SubscribePayload {
            channels: vec![ChannelSpec {
                name: channel,
                symbols,
            }],
        },
    })
}

pub fn ping_message() -> String {
    encode(&Outbound::Ping)
}

pub fn pong_message() -> String {
    encode(&Outbound::Pong)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_candle_with_payload() {
        let frame = json!({
            "type": "candlestick",
            "payload": {
                "time": 1704067200,
                "open": "2000.5",
                "high": 2010.0,
                "low": "1995",
                "close": "2005.25",
                "volume": 1234.5
            }
        });

        match parse_frame(&frame.to_string()).unwrap() {
            FeedEvent::Candle(candle) => {
                assert_eq!(candle.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
                assert_eq!(candle.open, 2000.5);
                assert_eq!(candle.low, 1995.0);
                assert_eq!(candle.close, 2005.25);
                assert_eq!(candle.volume, 1234.5);
            }
            other => panic!("expected candle, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_channel_named_candle_with_microseconds() {
        let frame = json!({
            "type": "candlestick_15m",
            "symbol": "ETHUSD",
            "candle_start_time": 1704067200000000_i64,
            "open": "1", "high": "2", "low": "0.5", "close": "1.5", "volume": "10"
        });

        match parse_frame(&frame.to_string()).unwrap() {
            FeedEvent::Candle(candle) => {
                assert_eq!(candle.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            }
            other => panic!("expected candle, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ticker() {
        let frame = json!({"type": "ticker", "payload": {"mark_price": "2101.5"}, "symbol": "ETHUSD"});

        match parse_frame(&frame.to_string()).unwrap() {
            FeedEvent::Tick(ticker) => {
                assert_eq!(ticker.mark_price, 2101.5);
                assert_eq!(ticker.symbol, "ETHUSD");
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(parse_frame(r#"{"type":"ping"}"#).unwrap(), FeedEvent::Ping);
        assert_eq!(parse_frame(r#"{"type":"pong"}"#).unwrap(), FeedEvent::Pong);
        assert_eq!(
            parse_frame(r#"{"type":"subscriptions","channels":[]}"#).unwrap(),
            FeedEvent::Other("subscriptions".to_string())
        );
        assert_eq!(parse_frame(r#"{"result":1}"#).unwrap(), FeedEvent::Other(String::new()));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(parse_frame("not json"), Err(FeedError::MalformedFrame(_))));

        // Candle missing its close
        let frame = json!({"type": "candlestick", "payload": {"time": 1, "open": 1, "high": 1, "low": 1, "volume": 1}});
        assert!(parse_frame(&frame.to_string()).is_err());

        let frame = json!({"type": "ticker", "payload": {"mark_price": "abc"}});
        assert!(parse_frame(&frame.to_string()).is_err());
    }

    #[test]
    fn test_outbound_messages() {
        let subscribe: Value =
            serde_json::from_str(&subscribe_message("candlestick_15m", &["ETHUSD".to_string()])).unwrap();
        assert_eq!(
            subscribe,
            json!({
                "type": "subscribe",
                "payload": {"channels": [{"name": "candlestick_15m", "symbols": ["ETHUSD"]}]}
            })
        );

        assert_eq!(ping_message(), r#"{"type":"ping"}"#);
        assert_eq!(pong_message(), r#"{"type":"pong"}"#);
        assert_eq!(candle_channel("15m"), "candlestick_15m");
    }
}
