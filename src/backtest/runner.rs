use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::backtest::metrics::{BacktestMetrics, TradeRecord};
use crate::engine::{CandleOutcome, EngineConfig, TradingEngine};
use crate::execution::{PaperExecutor, Position};
use crate::models::Candle;
use crate::notify::LogNotifier;
use crate::strategy::Detection;

/// Replays candles through a paper-trading engine
pub struct BacktestRunner {
    config: EngineConfig,
}

/// Intrabar path: open, then the extreme against the body, then the other, then close
pub fn intrabar_ticks(candle: &Candle) -> [f64; 4] {
    if candle.close >= candle.open {
        [candle.open, candle.low, candle.high, candle.close]
    } else {
        [candle.open, candle.high, candle.low, candle.close]
    }
}

impl BacktestRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run a backtest over `candles`
    ///
    /// Each candle's ticks are replayed through the stop logic before the
    /// closed candle itself reaches the signal path.
    pub async fn run(&self, candles: Vec<Candle>) -> Result<BacktestMetrics> {
        let warmup = self.config.indicators.warmup_candles();
        if candles.len() <= warmup {
            anyhow::bail!("Not enough candles for backtest. Need more than {}, got {}", warmup, candles.len());
        }

        tracing::info!("Starting backtest: {} candles, warm-up {}", candles.len(), warmup);

        let executor = Arc::new(PaperExecutor::new(self.config.initial_capital));
        let mut engine = TradingEngine::new(self.config.clone(), executor, Arc::new(LogNotifier));

        let mut trades = Vec::new();
        let mut rejected_signals = 0;

        for candle in candles {
            for price in intrabar_ticks(&candle) {
                let before = Self::observe(&engine);
                engine.process_tick(price).await?;
                Self::record_close(&engine, before, price, candle.timestamp, &mut trades);
            }

            let before = Self::observe(&engine);
            let close = candle.close;
            let timestamp = candle.timestamp;
            if let CandleOutcome::Evaluated(Detection::Rejected { .. }) = engine.process_candle(candle).await? {
                rejected_signals += 1;
            }
            Self::record_close(&engine, before, close, timestamp, &mut trades);
        }

        let metrics = BacktestMetrics::from_trades(trades, self.config.initial_capital, rejected_signals);

        tracing::info!(
            "Backtest complete: {} trades, P&L: ${:.2} ({:.2}%)",
            metrics.total_trades,
            metrics.total_pnl,
            metrics.total_return_pct
        );

        Ok(metrics)
    }

    /// Position and trade count before an event
    fn observe(engine: &TradingEngine) -> (Option<Position>, u32, f64) {
        let stats = engine.state().stats();
        (engine.state().position().cloned(), stats.total_trades, stats.total_pnl)
    }

    /// Capture a round trip if the last event realized one
    fn record_close(
        engine: &TradingEngine,
        before: (Option<Position>, u32, f64),
        exit_price: f64,
        exit_time: DateTime<Utc>,
        trades: &mut Vec<TradeRecord>,
    ) {
        let (position, trades_before, pnl_before) = before;
        let stats = engine.state().stats();
        if stats.total_trades == trades_before {
            return;
        }
        let Some(position) = position else {
            return;
        };

        trades.push(TradeRecord {
            side: position.side,
            entry_time: position.entry_time,
            exit_time,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl: stats.total_pnl - pnl_before,
            capital_after: stats.current_capital,
        });
    }

    /// Run backtest and print report
    pub async fn run_and_report(&self, candles: Vec<Candle>, scenario_name: &str) -> Result<BacktestMetrics> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Candles: {}", candles.len());
        println!("   Initial Capital: ${:.2}", self.config.initial_capital);

        let metrics = self.run(candles).await?;
        metrics.print_report();

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};

    #[test]
    fn test_intrabar_tick_order() {
        let bullish = Candle {
            timestamp: Utc::now(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 1.0,
        };
        assert_eq!(intrabar_ticks(&bullish), [100.0, 95.0, 110.0, 105.0]);

        let bearish = Candle {
            close: 97.0,
            ..bullish
        };
        assert_eq!(intrabar_ticks(&bearish), [100.0, 110.0, 95.0, 97.0]);
    }

    #[tokio::test]
    async fn test_backtest_all_scenarios_keep_capital_consistent() {
        let runner = BacktestRunner::new(EngineConfig::default());

        for scenario in MarketScenario::all() {
            let candles = SyntheticDataGenerator::new(42).generate(scenario, 400, 15);
            let metrics = runner.run(candles).await.unwrap();

            assert!(metrics.final_capital > 0.0, "{:?}", scenario);
            assert_eq!(metrics.winning_trades + metrics.losing_trades, metrics.total_trades);
            let realized: f64 = metrics.trades.iter().map(|t| t.pnl).sum();
            assert!((metrics.initial_capital + realized - metrics.final_capital).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_trades_respect_spacing() {
        let runner = BacktestRunner::new(EngineConfig::default());
        let candles = SyntheticDataGenerator::new(3).generate(MarketScenario::Volatile, 500, 15);

        let metrics = runner.run(candles).await.unwrap();
        for pair in metrics.trades.windows(2) {
            // Entries are at least min_trades_distance candles apart
            let gap = (pair[1].entry_time - pair[0].entry_time).num_minutes();
            assert!(gap >= 10 * 15, "entries {} minutes apart", gap);
        }
    }

    #[tokio::test]
    async fn test_backtest_insufficient_data() {
        let runner = BacktestRunner::new(EngineConfig::default());
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Uptrend, 40, 15);

        let err = runner.run(candles).await.unwrap_err();
        assert!(err.to_string().contains("Not enough candles"));
    }
}
