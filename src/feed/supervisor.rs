use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use super::heartbeat::{HealthAction, HeartbeatMonitor};
use super::messages::{
    candle_channel, parse_frame, ping_message, pong_message, subscribe_message, FeedEvent,
    TICKER_CHANNEL,
};
use crate::error::{Error, FeedError};
use crate::models::{Candle, Ticker};
use crate::notify::Notifier;

/// Observable lifecycle of the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Consumer of market events
///
/// Called inline by the supervisor, one frame at a time. An `Err` is treated
/// as an unrecoverable fault and stops the supervisor.
#[async_trait]
pub trait FeedHandler: Send {
    async fn on_candle(&mut self, candle: Candle) -> crate::Result<()>;

    async fn on_tick(&mut self, ticker: Ticker) -> crate::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub url: String,
    pub symbol: String,
    pub timeframe: String,
    /// Silence that triggers a warning and a liveness ping
    pub heartbeat_timeout: Duration,
    /// Time allowed for any frame to follow a liveness ping
    pub pong_timeout: Duration,
    pub reconnect_backoff: Duration,
    pub health_check_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            url: "wss://socket.india.delta.exchange".to_string(),
            symbol: "ETHUSD".to_string(),
            timeframe: "15m".to_string(),
            heartbeat_timeout: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(5),
        }
    }
}

/// Owns one live market-data connection at a time and keeps it alive
pub struct StreamSupervisor {
    config: SupervisorConfig,
    notifier: Arc<dyn Notifier>,
    state_tx: watch::Sender<ConnectionState>,
}

impl StreamSupervisor {
    pub fn new(config: SupervisorConfig, notifier: Arc<dyn Notifier>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            config,
            notifier,
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Connect, dispatch and reconnect forever
    ///
    /// Transport problems never end the loop; only a handler fault does.
    pub async fn run<H: FeedHandler + ?Sized>(&self, handler: &mut H) -> crate::Result<()> {
        tracing::info!("Starting market feed for {} ({})", self.config.symbol, self.config.timeframe);

        loop {
            match self.run_connection(handler).await {
                Ok(()) => {
                    let msg = "WebSocket connection closed by server";
                    tracing::info!("{}", msg);
                    self.notifier.notify(&format!("🔴 {}", msg)).await;
                }
                Err(FeedError::Handler(e)) => {
                    self.set_state(ConnectionState::Closed);
                    tracing::error!("Event handler fault, stopping feed: {}", e);
                    return Err(Error::Feed(FeedError::Handler(e)));
                }
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    self.notifier.notify(&format!("⚠️ WebSocket Error: {}", e)).await;
                }
            }

            self.set_state(ConnectionState::Closed);
            tracing::info!(
                "Connection lost, waiting {}s before reconnecting...",
                self.config.reconnect_backoff.as_secs_f64()
            );
            tokio::time::sleep(self.config.reconnect_backoff).await;
        }
    }

    async fn run_connection<H: FeedHandler + ?Sized>(&self, handler: &mut H) -> Result<(), FeedError> {
        self.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to {}", self.config.url);

        let (ws_stream, _) = connect_async(self.config.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Open);
        tracing::info!("WebSocket connection established");
        self.notifier.notify("🟢 Connected to Delta Exchange").await;

        let symbols = vec![self.config.symbol.clone()];
        for channel in [candle_channel(&self.config.timeframe), TICKER_CHANNEL.to_string()] {
            send_text(&mut write, subscribe_message(&channel, &symbols)).await?;
            tracing::info!("Subscribed to {} for symbols {:?}", channel, symbols);
            self.notifier
                .notify(&format!("📊 Subscribed to {} for {:?}", channel, symbols))
                .await;
        }
        send_text(&mut write, ping_message()).await?;

        let mut heartbeat = HeartbeatMonitor::new(
            self.config.heartbeat_timeout,
            self.config.pong_timeout,
            Instant::now(),
        );
        let mut health = tokio::time::interval(self.config.health_check_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = read.next() => {
                    let message = match frame {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };
                    heartbeat.record_frame(Instant::now());

                    match message {
                        Message::Text(text) => {
                            let event = match parse_frame(&text) {
                                Ok(event) => event,
                                Err(e) => {
                                    tracing::warn!("Error processing message: {}", e);
                                    self.notifier.notify(&format!("⚠️ Error processing message: {}", e)).await;
                                    continue;
                                }
                            };
                            match event {
                                FeedEvent::Candle(candle) => {
                                    handler.on_candle(candle).await.map_err(|e| FeedError::Handler(Box::new(e)))?;
                                }
                                FeedEvent::Tick(ticker) => {
                                    handler.on_tick(ticker).await.map_err(|e| FeedError::Handler(Box::new(e)))?;
                                }
                                FeedEvent::Ping => {
                                    send_text(&mut write, pong_message()).await?;
                                    tracing::debug!("Received ping, sent pong");
                                }
                                FeedEvent::Pong => tracing::debug!("Received pong"),
                                FeedEvent::Other(kind) => tracing::debug!("Ignoring {} frame", kind),
                            }
                        }
                        Message::Close(frame) => {
                            self.set_state(ConnectionState::Closing);
                            tracing::info!("WebSocket closed with frame: {:?}", frame);
                            return Ok(());
                        }
                        // Transport-level pings are answered by tungstenite
                        _ => {}
                    }
                }
                _ = health.tick() => {
                    match heartbeat.check(Instant::now()) {
                        HealthAction::Healthy => {}
                        HealthAction::SendPing { silent_for } => {
                            tracing::warn!("No heartbeat received for over {}s", silent_for.as_secs());
                            self.notifier
                                .notify(&format!(
                                    "⚠️ Warning: No market data received for over {} seconds",
                                    self.config.heartbeat_timeout.as_secs()
                                ))
                                .await;
                            tracing::info!("Sending ping to check connection");
                            if let Err(e) = send_text(&mut write, ping_message()).await {
                                return Err(FeedError::Unhealthy(format!("failed to send ping: {}", e)));
                            }
                        }
                        HealthAction::Reconnect => {
                            return Err(FeedError::Unhealthy(format!(
                                "no response to ping within {}s",
                                self.config.pong_timeout.as_secs()
                            )));
                        }
                    }
                }
            }
        }
    }
}

async fn send_text<S>(write: &mut S, text: String) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    write.send(Message::Text(text)).await?;
    Ok(())
}
