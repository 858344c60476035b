use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb with noise
    Uptrend,
    /// Steady decline with noise
    Downtrend,
    /// Mean-reverting chop around the start price
    Sideways,
    /// Large random swings, frequent breaks in both directions
    Volatile,
    /// Calm drift, then a sharp sell-off in the second half
    Crash,
}

impl MarketScenario {
    pub fn all() -> [MarketScenario; 5] {
        [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
            MarketScenario::Crash,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "📈 Uptrend",
            MarketScenario::Downtrend => "📉 Downtrend",
            MarketScenario::Sideways => "↔️  Sideways",
            MarketScenario::Volatile => "⚡ Volatile",
            MarketScenario::Crash => "💥 Crash",
        }
    }
}

/// Seeded OHLCV generator
///
/// Each candle opens at the previous close, so open-to-open percent change
/// behaves like a live feed. Volume rises with the size of the move.
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 2000.0,
            base_volume: 5_000.0,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now),
        }
    }

    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = price;
        self
    }

    /// Generate `num_candles` candles spaced `interval_minutes` apart
    pub fn generate(&mut self, scenario: MarketScenario, num_candles: usize, interval_minutes: i64) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut open = self.base_price;

        for i in 0..num_candles {
            let ret = self.next_return(scenario, i, num_candles, open);
            let close = (open * (1.0 + ret)).max(self.base_price * 0.05);
            let timestamp = self.start + Duration::minutes(i as i64 * interval_minutes);

            candles.push(self.create_candle(timestamp, open, close));
            open = close;
        }

        candles
    }

    /// Per-candle return for the scenario
    fn next_return(&mut self, scenario: MarketScenario, i: usize, n: usize, price: f64) -> f64 {
        match scenario {
            MarketScenario::Uptrend => 0.0012 + self.rng.gen_range(-0.004..0.004),
            MarketScenario::Downtrend => -0.0012 + self.rng.gen_range(-0.004..0.004),
            MarketScenario::Sideways => {
                let pull = (self.base_price - price) / self.base_price * 0.05;
                pull + self.rng.gen_range(-0.004..0.004)
            }
            MarketScenario::Volatile => self.rng.gen_range(-0.02..0.02),
            MarketScenario::Crash => {
                if i < n / 2 {
                    self.rng.gen_range(-0.003..0.0035)
                } else {
                    // Roughly -35% across the second half
                    -0.7 / n as f64 + self.rng.gen_range(-0.006..0.004)
                }
            }
        }
    }

    fn create_candle(&mut self, timestamp: DateTime<Utc>, open: f64, close: f64) -> Candle {
        let wick = 0.002;
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..wick));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick));

        let move_pct = ((close - open) / open).abs();
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3) * (1.0 + move_pct * 100.0);

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
