use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PositionError;
use crate::models::Side;

/// Stop distances applied to every position
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Initial stop distance from entry as a fraction (0.02 = 2%)
    pub stop_loss_pct: f64,
    /// Trailing distance from the latest favourable price
    pub trailing_stop_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.02,
            trailing_stop_pct: 0.015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    /// Closed by an opposite-direction signal
    Flip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub side: Side,
    pub entry_price: f64,
    /// Size in base units, `capital / entry_price` at entry
    pub size: f64,
    pub stop_loss_price: f64,
    pub trailing_stop_price: f64,
    /// Candle sequence number the position was opened on
    pub opened_at_index: u64,
    pub entry_time: DateTime<Utc>,
    /// Resting reduce-only stop order on the exchange, if one was placed
    pub protective_order_id: Option<String>,
}

impl Position {
    /// Whether `price` breaches the stop against this position
    pub fn is_stop_breached(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss_price,
            Side::Short => price >= self.stop_loss_price,
        }
    }
}

/// Process-lifetime trade accounting, mutated only on close
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub total_pnl: f64,
    pub current_capital: f64,
    pub initial_capital: f64,
}

impl TradeStats {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            total_pnl: 0.0,
            current_capital: initial_capital,
            initial_capital,
        }
    }

    fn record(&mut self, pnl: f64) {
        self.total_trades += 1;
        self.total_pnl += pnl;
        self.current_capital += pnl;
        if pnl > 0.0 {
            self.winning_trades += 1;
        }
    }

    /// Win rate in percent, 0 before the first trade
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / self.total_trades as f64 * 100.0
    }

    pub fn average_pnl(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.total_pnl / self.total_trades as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "📊 Trade Statistics\n\
             Total Trades: {}\n\
             Win Rate: {:.2}%\n\
             Total PnL: ${:.2}\n\
             Average PnL: ${:.2}\n\
             Current Capital: ${:.2}",
            self.total_trades,
            self.win_rate(),
            self.total_pnl,
            self.average_pnl(),
            self.current_capital
        )
    }
}

/// Result of closing a position
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub reason: ExitReason,
    pub capital_after: f64,
}

/// What a tick did to the open position
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No position open
    Flat,
    /// Position open, stops unchanged
    Hold,
    /// Price breached the stop; the caller must close the position
    StopTriggered { side: Side, stop_price: f64 },
    /// Trailing stop tightened toward the price
    TrailingRaised { side: Side, previous: f64, stop: f64 },
}

/// Single-position trading state: Flat, Long or Short
///
/// Owns the open position, the trade statistics and the cooldown marker.
/// Exit orders are confirmed by the caller before `close` is invoked, so the
/// local state never runs ahead of the exchange.
#[derive(Debug, Clone)]
pub struct TradingState {
    risk: RiskConfig,
    position: Option<Position>,
    stats: TradeStats,
    last_trade_index: Option<u64>,
}

impl TradingState {
    pub fn new(initial_capital: f64, risk: RiskConfig) -> Self {
        Self {
            risk,
            position: None,
            stats: TradeStats::new(initial_capital),
            last_trade_index: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Side of the open position, `None` while flat
    pub fn side(&self) -> Option<Side> {
        self.position.as_ref().map(|p| p.side)
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn last_trade_index(&self) -> Option<u64> {
        self.last_trade_index
    }

    /// Full-compounding size: the whole current capital at `price`
    pub fn position_size_for(&self, price: f64) -> f64 {
        self.stats.current_capital / price
    }

    /// Initial stop for an entry at `price`
    pub fn initial_stop(&self, side: Side, price: f64) -> f64 {
        match side {
            Side::Long => price * (1.0 - self.risk.stop_loss_pct),
            Side::Short => price * (1.0 + self.risk.stop_loss_pct),
        }
    }

    /// Flat -> Long/Short
    ///
    /// Sizes the position from current capital, sets the initial stop and
    /// advances the cooldown marker.
    pub fn open(
        &mut self,
        side: Side,
        entry_price: f64,
        sequence: u64,
        entry_time: DateTime<Utc>,
    ) -> Result<&Position, PositionError> {
        if let Some(existing) = &self.position {
            return Err(PositionError::AlreadyOpen(existing.side));
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(PositionError::InvalidPrice(entry_price));
        }

        let stop_loss_price = self.initial_stop(side, entry_price);
        let position = Position {
            id: Uuid::new_v4(),
            side,
            entry_price,
            size: self.position_size_for(entry_price),
            stop_loss_price,
            trailing_stop_price: stop_loss_price,
            opened_at_index: sequence,
            entry_time,
            protective_order_id: None,
        };

        tracing::debug!(
            side = %side,
            entry_price,
            size = position.size,
            stop = stop_loss_price,
            "Position opened"
        );

        self.last_trade_index = Some(sequence);
        Ok(self.position.insert(position))
    }

    /// Remember the exchange id of the resting protective stop
    pub fn set_protective_order(&mut self, order_id: String) {
        if let Some(position) = self.position.as_mut() {
            position.protective_order_id = Some(order_id);
        }
    }

    /// Forget the protective order id, returning it if one was set
    pub fn clear_protective_order(&mut self) -> Option<String> {
        self.position.as_mut()?.protective_order_id.take()
    }

    /// Unrealized PnL of the open position at `price`
    pub fn calculate_pnl(&self, price: f64) -> Option<f64> {
        let position = self.position.as_ref()?;
        Some(self.pnl_for(position, price))
    }

    fn pnl_for(&self, position: &Position, exit_price: f64) -> f64 {
        let change = (exit_price - position.entry_price) / position.entry_price;
        match position.side {
            Side::Long => change * self.stats.current_capital,
            Side::Short => -change * self.stats.current_capital,
        }
    }

    /// Long/Short -> Flat
    ///
    /// Realizes PnL against current capital and records the trade.
    pub fn close(&mut self, exit_price: f64, reason: ExitReason) -> Result<ClosedTrade, PositionError> {
        let position = self.position.take().ok_or(PositionError::NotOpen)?;

        let pnl = self.pnl_for(&position, exit_price);
        self.stats.record(pnl);

        Ok(ClosedTrade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl,
            reason,
            capital_after: self.stats.current_capital,
        })
    }

    /// Tick-level risk check
    ///
    /// The stop check runs before the trailing ratchet, so a tick that
    /// breaches the stop is reported as `StopTriggered` and never ratchets.
    /// The stop only moves toward the price.
    pub fn on_tick(&mut self, price: f64) -> TickOutcome {
        let trailing_pct = self.risk.trailing_stop_pct;
        let Some(position) = self.position.as_mut() else {
            return TickOutcome::Flat;
        };

        if position.is_stop_breached(price) {
            return TickOutcome::StopTriggered {
                side: position.side,
                stop_price: position.stop_loss_price,
            };
        }

        let candidate = match position.side {
            Side::Long if price > position.entry_price => {
                let stop = price * (1.0 - trailing_pct);
                (stop > position.trailing_stop_price).then_some(stop)
            }
            Side::Short if price < position.entry_price => {
                let stop = price * (1.0 + trailing_pct);
                (stop < position.trailing_stop_price).then_some(stop)
            }
            _ => None,
        };

        match candidate {
            Some(stop) => {
                let previous = position.stop_loss_price;
                position.trailing_stop_price = stop;
                position.stop_loss_price = stop;
                TickOutcome::TrailingRaised {
                    side: position.side,
                    previous,
                    stop,
                }
            }
            None => TickOutcome::Hold,
        }
    }
}
