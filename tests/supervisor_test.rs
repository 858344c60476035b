use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use obtrader::feed::{ConnectionState, FeedHandler, StreamSupervisor, SupervisorConfig};
use obtrader::models::{Candle, Ticker};
use obtrader::notify::Notifier;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn contains(&self, needle: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

/// Forwards every dispatched event to the test body
struct ChannelHandler {
    events: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FeedHandler for ChannelHandler {
    async fn on_candle(&mut self, candle: Candle) -> obtrader::Result<()> {
        let _ = self.events.send(format!("candle:{}", candle.close));
        Ok(())
    }

    async fn on_tick(&mut self, ticker: Ticker) -> obtrader::Result<()> {
        let _ = self.events.send(format!("tick:{}", ticker.mark_price));
        Ok(())
    }
}

fn fast_config(url: String) -> SupervisorConfig {
    SupervisorConfig {
        url,
        symbol: "ETHUSD".to_string(),
        timeframe: "15m".to_string(),
        heartbeat_timeout: Duration::from_millis(300),
        pong_timeout: Duration::from_millis(300),
        reconnect_backoff: Duration::from_millis(50),
        health_check_interval: Duration::from_millis(50),
    }
}

fn candle_frame(time: i64, close: f64) -> String {
    json!({
        "type": "candlestick_15m",
        "symbol": "ETHUSD",
        "payload": {
            "time": time,
            "open": "2000", "high": "2010", "low": "1990",
            "close": close.to_string(), "volume": "12.5"
        }
    })
    .to_string()
}

async fn next_text<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await.expect("stream ended").expect("read failed") {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

async fn expect_handshake<S>(ws: &mut S)
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let first = next_text(ws).await;
    assert_eq!(first["type"], "subscribe");
    assert_eq!(first["payload"]["channels"][0]["name"], "candlestick_15m");
    assert_eq!(first["payload"]["channels"][0]["symbols"][0], "ETHUSD");

    let second = next_text(ws).await;
    assert_eq!(second["payload"]["channels"][0]["name"], "v2/ticker");

    assert_eq!(next_text(ws).await, json!({"type": "ping"}));
}

#[tokio::test]
async fn test_subscribes_dispatches_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        // First session: handshake, ping/pong, events, then a server close
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;

        ws.send(Message::Text(r#"{"type":"ping"}"#.to_string())).await.unwrap();
        assert_eq!(next_text(&mut ws).await, json!({"type": "pong"}));

        ws.send(Message::Text(candle_frame(1704067200, 2005.0))).await.unwrap();
        ws.send(Message::Text(
            json!({"type": "v2/ticker", "symbol": "ETHUSD", "mark_price": "2001.5"}).to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text("not json".to_string())).await.unwrap();
        ws.send(Message::Text(candle_frame(1704068100, 2007.0))).await.unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        // Second session proves the supervisor came back and resubscribed
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;
        ws.send(Message::Text(candle_frame(1704069000, 2009.0))).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = StreamSupervisor::new(fast_config(url), notifier.clone());
    let state = supervisor.subscribe_state();
    assert_eq!(supervisor.state(), ConnectionState::Closed);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handler = ChannelHandler { events: tx };

    let mut seen = Vec::new();
    let collect = async {
        while seen.len() < 4 {
            seen.push(rx.recv().await.unwrap());
        }
    };

    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::select! {
            result = supervisor.run(&mut handler) => panic!("supervisor stopped: {:?}", result),
            _ = collect => {}
        }
    })
    .await
    .expect("timed out waiting for events");

    assert_eq!(seen, vec!["candle:2005", "tick:2001.5", "candle:2007", "candle:2009"]);
    assert_eq!(*state.borrow(), ConnectionState::Open);

    // The malformed frame was reported but did not drop the session
    assert!(notifier.contains("Error processing message"));
    assert!(notifier.contains("closed by server"));
    assert!(notifier.contains("Subscribed to v2/ticker"));

    server.abort();
}

#[tokio::test]
async fn test_silent_server_is_pinged_then_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (reconnected_tx, mut reconnected_rx) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;

        // Never answer: the next text frame must be the liveness ping
        assert_eq!(next_text(&mut ws).await, json!({"type": "ping"}));

        let (stream, _) = listener.accept().await.unwrap();
        let mut second = accept_async(stream).await.unwrap();
        expect_handshake(&mut second).await;
        reconnected_tx.send(()).unwrap();
        while let Some(Ok(_)) = second.next().await {}
        drop(ws);
    });

    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = StreamSupervisor::new(fast_config(url), notifier.clone());
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut handler = ChannelHandler { events: tx };

    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::select! {
            result = supervisor.run(&mut handler) => panic!("supervisor stopped: {:?}", result),
            _ = reconnected_rx.recv() => {}
        }
    })
    .await
    .expect("timed out waiting for reconnect");

    assert!(notifier.contains("No market data received"));
    assert!(notifier.contains("WebSocket Error"));

    server.abort();
}

struct FailingHandler;

#[async_trait]
impl FeedHandler for FailingHandler {
    async fn on_candle(&mut self, _candle: Candle) -> obtrader::Result<()> {
        Err(obtrader::Error::InvalidConfig("handler broke".to_string()))
    }

    async fn on_tick(&mut self, _ticker: Ticker) -> obtrader::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_handler_fault_stops_supervisor() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_handshake(&mut ws).await;
        ws.send(Message::Text(candle_frame(1704067200, 2005.0))).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let supervisor = StreamSupervisor::new(fast_config(url), Arc::new(RecordingNotifier::default()));
    let result = tokio::time::timeout(Duration::from_secs(10), supervisor.run(&mut FailingHandler))
        .await
        .expect("supervisor kept running");

    assert!(result.is_err());
    assert_eq!(supervisor.state(), ConnectionState::Closed);

    server.abort();
}
