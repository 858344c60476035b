use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ExecutionError;
use crate::execution::{
    CandleWindow, ClosedTrade, ExecutionClient, ExitReason, Position, RiskConfig, TickOutcome,
    TradingState,
};
use crate::feed::{BarUpdate, FeedHandler, FormingBar};
use crate::indicators::{compute_snapshots, IndicatorSettings, IndicatorSnapshot};
use crate::models::{Candle, OrderRequest, Side, Ticker};
use crate::notify::Notifier;
use crate::strategy::{Detection, SignalConfig, SignalDetector};

/// Everything the engine needs besides its collaborators
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub window_capacity: usize,
    pub indicators: IndicatorSettings,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100.0,
            window_capacity: crate::execution::DEFAULT_WINDOW_CAPACITY,
            indicators: IndicatorSettings::default(),
            signal: SignalConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

/// What processing one closed candle led to
#[derive(Debug, Clone, PartialEq)]
pub enum CandleOutcome {
    /// Candle rejected by the window (duplicate or out of order)
    Skipped,
    Evaluated(Detection),
}

/// Result of acting on a qualified signal
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Opened(Side),
    /// Opposite position closed and the new one opened at the same price
    Flipped { closed: ClosedTrade, opened: Side },
    /// Exchange refused the entry; state stays flat
    EntryFailed,
    /// Exchange refused the close; the old position is still open
    CloseFailed,
    /// Already positioned in this direction
    Ignored,
}

/// Streaming signal engine and position lifecycle
///
/// Every mutation of the window and the trading state happens through
/// `&mut self`, driven one event at a time by the stream supervisor.
/// Local state changes only after the exchange acknowledges an order.
pub struct TradingEngine {
    window: CandleWindow,
    settings: IndicatorSettings,
    detector: SignalDetector,
    state: TradingState,
    executor: Arc<dyn ExecutionClient>,
    notifier: Arc<dyn Notifier>,
    last_snapshot: Option<IndicatorSnapshot>,
    forming: FormingBar,
    /// Set while a refused exit leaves local and exchange state apart
    close_gap: bool,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        executor: Arc<dyn ExecutionClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            window: CandleWindow::new(config.window_capacity),
            settings: config.indicators,
            detector: SignalDetector::new(config.signal),
            state: TradingState::new(config.initial_capital, config.risk),
            executor,
            notifier,
            last_snapshot: None,
            forming: FormingBar::new(),
            close_gap: false,
        }
    }

    pub fn state(&self) -> &TradingState {
        &self.state
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    /// Indicator values computed for the newest candle
    pub fn last_snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Report initial capital and the exchange balance
    pub async fn announce_startup(&self) {
        let capital = self.state.stats().initial_capital;
        match self.executor.get_balance().await {
            Ok(balance) => {
                tracing::info!("Exchange balance: {}", balance.available);
                self.notifier
                    .notify(&format!(
                        "🚀 Bot Started\nInitial Capital: ${}\nExchange Balance: ${}",
                        capital, balance.available
                    ))
                    .await;
            }
            Err(e) => {
                tracing::error!("Error getting wallet balances: {}", e);
                self.notifier
                    .notify(&format!("⚠️ Bot Started with error: {}", e))
                    .await;
            }
        }
    }

    /// Append a closed candle, recompute indicators and act on any signal
    pub async fn process_candle(&mut self, candle: Candle) -> crate::Result<CandleOutcome> {
        let close = candle.close;
        let timestamp = candle.timestamp;

        if let Err(e) = self.window.append(candle) {
            tracing::warn!("Skipping candle: {}", e);
            return Ok(CandleOutcome::Skipped);
        }

        let candles = self.window.as_sequence();
        let snapshots = compute_snapshots(candles, &self.settings);
        let index = snapshots.len() - 1;
        let sequence = self.window.latest_sequence().unwrap_or_default();

        let current = &snapshots[index];
        tracing::debug!(
            sequence,
            close,
            pc = ?current.pc,
            volume_percentile = ?current.volume_percentile,
            sma_fast = ?current.sma_fast,
            sma_slow = ?current.sma_slow,
            roc = ?current.roc,
            atr = ?current.atr,
            "Indicators"
        );

        let detection = self.detector.evaluate(
            &snapshots,
            index,
            sequence,
            self.state.side(),
            self.state.last_trade_index(),
        );
        self.last_snapshot = Some(current.clone());

        match &detection {
            Detection::Signal(side) => {
                tracing::info!(side = %side, close, sequence, "Order block signal");
                self.execute_signal(*side, close, sequence, timestamp).await?;
            }
            Detection::Rejected { side, reason } => {
                tracing::info!(side = %side, sequence, "Break rejected: {}", reason);
            }
            Detection::NoBreak => {}
        }

        Ok(CandleOutcome::Evaluated(detection))
    }

    /// Enter `side` at `price`, closing an opposite position first
    pub async fn execute_signal(
        &mut self,
        side: Side,
        price: f64,
        sequence: u64,
        timestamp: DateTime<Utc>,
    ) -> crate::Result<SignalOutcome> {
        let closed = match self.state.side() {
            Some(current) if current == side => return Ok(SignalOutcome::Ignored),
            Some(_) => match self.close_position(price, ExitReason::Flip).await? {
                Some(trade) => Some(trade),
                None => return Ok(SignalOutcome::CloseFailed),
            },
            None => None,
        };

        let opened = self.open_position(side, price, sequence, timestamp).await?;

        Ok(match (closed, opened) {
            (Some(closed), true) => SignalOutcome::Flipped { closed, opened: side },
            (None, true) => SignalOutcome::Opened(side),
            (_, false) => SignalOutcome::EntryFailed,
        })
    }

    async fn open_position(
        &mut self,
        side: Side,
        price: f64,
        sequence: u64,
        timestamp: DateTime<Utc>,
    ) -> crate::Result<bool> {
        debug_assert!(self.state.position().is_none());

        let size = self.state.position_size_for(price);
        let order = OrderRequest::market(side.entry_order_side(), size);
        if let Err(e) = self.executor.place_order(&order).await {
            let msg = format!("Error placing order: {}", e);
            tracing::error!("{}", msg);
            self.notifier.notify(&format!("⚠️ {}", msg)).await;
            return Ok(false);
        }

        let position = self.state.open(side, price, sequence, timestamp)?.clone();

        let stop_order =
            OrderRequest::protective_stop(side.exit_order_side(), position.size, position.stop_loss_price);
        match self.executor.place_order(&stop_order).await {
            Ok(ack) => self.state.set_protective_order(ack.order_id),
            Err(e) => {
                let msg = format!("Error placing stop loss order: {}", e);
                tracing::error!("{}", msg);
                self.notifier.notify(&format!("⚠️ {}", msg)).await;
            }
        }

        let risk = self.state.risk();
        let trade_info = format!(
            "✅ New {} Position\nEntry Price: ${}\nSize: {}\nValue: ${:.2}\nStop Loss: ${}\nRisk: {}%\nTrailing Stop: {}%",
            side,
            price,
            position.size,
            self.state.stats().current_capital,
            position.stop_loss_price,
            risk.stop_loss_pct * 100.0,
            risk.trailing_stop_pct * 100.0
        );
        tracing::info!("{}", trade_info);
        self.notifier.notify(&trade_info).await;

        Ok(true)
    }

    /// Close the open position at `price`
    ///
    /// The protective stop is cancelled first so it cannot race the exit.
    /// Returns `None` when the exchange refused the exit and still holds the
    /// position; the local position is then kept and a reconciliation alert
    /// is raised once for the gap.
    async fn close_position(&mut self, price: f64, reason: ExitReason) -> crate::Result<Option<ClosedTrade>> {
        let Some(position) = self.state.position().cloned() else {
            return Ok(None);
        };

        if let Some(order_id) = position.protective_order_id.as_deref() {
            match self.executor.cancel_order(order_id).await {
                Ok(()) => {
                    self.state.clear_protective_order();
                }
                Err(e) => {
                    tracing::warn!("Failed to cancel protective stop {}: {}", order_id, e);
                    if !self.close_gap {
                        self.notifier
                            .notify(&format!("⚠️ Failed to cancel stop order {}: {}", order_id, e))
                            .await;
                    }
                }
            }
        }

        let order = OrderRequest::close(position.side.exit_order_side(), position.size);
        let placed = self.executor.place_order(&order).await;
        let exit_price = match placed {
            Ok(_) => price,
            Err(e) => match self.reconcile_refused_close(&position, price, e).await {
                Some(exit_price) => exit_price,
                None => return Ok(None),
            },
        };

        self.close_gap = false;
        let trade = self.state.close(exit_price, reason)?;

        tracing::info!(
            side = %trade.side,
            entry = trade.entry_price,
            exit = trade.exit_price,
            pnl = trade.pnl,
            "Closed position ({:?})",
            reason
        );
        self.notifier
            .notify(&format!(
                "🔄 Position Closed\nType: {}\nEntry: ${}\nExit: ${}\nSize: {}\nPnL: ${:.2}\nCurrent Capital: ${:.2}",
                trade.side, trade.entry_price, trade.exit_price, trade.size, trade.pnl, trade.capital_after
            ))
            .await;
        self.notifier.notify(&self.state.stats().summary()).await;

        Ok(Some(trade))
    }

    /// Decide what a refused exit means
    ///
    /// If the exchange is already flat the protective stop filled, and the
    /// exit price to book is that stop. Otherwise the gap stays open.
    async fn reconcile_refused_close(
        &mut self,
        position: &Position,
        price: f64,
        error: ExecutionError,
    ) -> Option<f64> {
        tracing::error!("Error placing close order: {}", error);

        match self.executor.get_position_size().await {
            Ok(size) if size.abs() < f64::EPSILON => {
                let stop = self.state.initial_stop(position.side, position.entry_price);
                tracing::warn!(stop, "Exchange already flat, booking exit at protective stop");
                self.notifier
                    .notify(&format!(
                        "⚠️ Exchange position already closed by the stop order\nBooking exit at ${}",
                        stop
                    ))
                    .await;
                return Some(stop);
            }
            Ok(size) => tracing::debug!(size, "Exchange still holds the position"),
            Err(e) => tracing::warn!("Failed to read exchange position: {}", e),
        }

        if !self.close_gap {
            self.close_gap = true;
            self.notifier.notify(&format!("⚠️ Error placing order: {}", error)).await;
            self.notifier
                .notify(&format!(
                    "⚠️ Reconciliation gap: {} position from ${} is still open locally after a failed close at ${}",
                    position.side, position.entry_price, price
                ))
                .await;
        }
        None
    }

    /// Tick-level stop check and trailing ratchet
    pub async fn process_tick(&mut self, price: f64) -> crate::Result<TickOutcome> {
        let outcome = self.state.on_tick(price);

        match &outcome {
            TickOutcome::StopTriggered { side, stop_price } => {
                tracing::info!("Stop loss triggered at {}", price);
                // A retry after a refused exit was already announced
                if !self.close_gap {
                    self.notifier
                        .notify(&format!(
                            "🛑 Stop Loss Triggered\nPosition: {}\nPrice: ${}\nStop Level: ${}",
                            side, price, stop_price
                        ))
                        .await;
                }
                self.close_position(price, ExitReason::StopLoss).await?;
            }
            TickOutcome::TrailingRaised { side, stop, .. } => {
                tracing::info!("Updated trailing stop to {}", stop);
                let icon = match side {
                    Side::Long => "📈",
                    Side::Short => "📉",
                };
                self.notifier
                    .notify(&format!(
                        "{} Trailing Stop Updated\nNew Stop: ${}\nCurrent Price: ${}",
                        icon, stop, price
                    ))
                    .await;
            }
            TickOutcome::Flat | TickOutcome::Hold => {}
        }

        Ok(outcome)
    }
}

#[async_trait]
impl FeedHandler for TradingEngine {
    /// Streamed bars are revised in place; only a finished bar is processed
    async fn on_candle(&mut self, candle: Candle) -> crate::Result<()> {
        match self.forming.update(candle) {
            BarUpdate::Closed(closed) => self.process_candle(closed).await.map(|_| ()),
            BarUpdate::Started | BarUpdate::Revised => Ok(()),
            BarUpdate::Stale => {
                tracing::debug!("Ignoring update for an older bar");
                Ok(())
            }
        }
    }

    async fn on_tick(&mut self, ticker: Ticker) -> crate::Result<()> {
        self.process_tick(ticker.mark_price).await.map(|_| ())
    }
}
