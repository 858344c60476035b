use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Side;

/// Record of a single round trip for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    /// Capital after this trade was realized
    pub capital_after: f64,
}

impl TradeRecord {
    pub fn holding_period_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }
}

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub win_rate: f64,

    // Distribution
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub avg_holding_period_minutes: f64,

    /// Candles whose breaks were filtered out by a trade condition
    pub rejected_signals: usize,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    pub fn from_trades(trades: Vec<TradeRecord>, initial_capital: f64, rejected_signals: usize) -> Self {
        let total_trades = trades.len();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let final_capital = initial_capital + total_pnl;

        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let long_trades = trades.iter().filter(|t| t.side == Side::Long).count();

        let total_wins: f64 = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).sum();
        let total_losses: f64 = trades.iter().map(|t| t.pnl).filter(|p| *p <= 0.0).map(f64::abs).sum();

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let avg_holding_period_minutes = if total_trades > 0 {
            trades.iter().map(|t| t.holding_period_minutes()).sum::<i64>() as f64 / total_trades as f64
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(&trades, initial_capital);

        Self {
            initial_capital,
            final_capital,
            total_pnl,
            total_return_pct: if initial_capital > 0.0 {
                total_pnl / initial_capital * 100.0
            } else {
                0.0
            },
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            long_trades,
            short_trades: total_trades - long_trades,
            win_rate,
            largest_win: trades.iter().map(|t| t.pnl).fold(0.0, f64::max),
            largest_loss: trades.iter().map(|t| t.pnl).fold(0.0, f64::min),
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            avg_holding_period_minutes,
            rejected_signals,
            trades,
        }
    }

    /// Peak-to-trough decline of the capital curve
    fn calculate_drawdown(trades: &[TradeRecord], initial_capital: f64) -> (f64, f64) {
        let mut peak = initial_capital;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for trade in trades {
            let capital = trade.capital_after;
            if capital > peak {
                peak = capital;
            }
            let drawdown = peak - capital;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Capital:       ${:.2}", self.initial_capital);
        println!("  Final Capital:         ${:.2}", self.final_capital);
        println!("  P&L:                   ${:.2} ({:+.2}%)", self.total_pnl, self.total_return_pct);

        println!("\n📈 TRADE STATISTICS");
        println!("  Total Trades:          {} ({} long / {} short)", self.total_trades, self.long_trades, self.short_trades);
        println!("  Winning Trades:        {} ({:.1}%)", self.winning_trades, self.win_rate);
        println!("  Losing Trades:         {}", self.losing_trades);
        println!("  Rejected Breaks:       {}", self.rejected_signals);

        if self.total_trades > 0 {
            println!("\n💰 WIN/LOSS ANALYSIS");
            println!("  Largest Win:           ${:.2}", self.largest_win);
            println!("  Largest Loss:          ${:.2}", self.largest_loss);
            println!("  Profit Factor:         {:.2}", self.profit_factor);

            println!("\n⚠️  RISK METRICS");
            println!("  Max Drawdown:          ${:.2} ({:.2}%)", self.max_drawdown, self.max_drawdown_pct);
            println!(
                "  Avg Holding Period:    {:.1} minutes ({:.1} hours)",
                self.avg_holding_period_minutes,
                self.avg_holding_period_minutes / 60.0
            );
        }

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}
