use super::atr::{atr_series, true_range_series};
use super::moving_average::{rolling_mean, sma_series};
use super::momentum::{open_change_series, roc_series};
use super::volume::volume_percentile_series;
use crate::models::Candle;

/// Lookback periods used to derive an `IndicatorSnapshot`
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub pc_lookback: usize,
    pub volume_ma_period: usize,
    pub volume_rank_window: usize,
    /// Fast trend average (configured trend period)
    pub trend_period: usize,
    pub slow_trend_period: usize,
    pub atr_period: usize,
    pub avg_atr_period: usize,
    pub roc_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            pc_lookback: 4,
            volume_ma_period: 20,
            volume_rank_window: 50,
            trend_period: 20,
            slow_trend_period: 50,
            atr_period: 14,
            avg_atr_period: 20,
            roc_period: 10,
        }
    }
}

impl IndicatorSettings {
    pub fn with_trend_period(mut self, trend_period: usize) -> Self {
        self.trend_period = trend_period;
        self
    }

    /// Candles needed before every field of a snapshot can be defined
    pub fn warmup_candles(&self) -> usize {
        let atr_chain = self.atr_period + self.avg_atr_period;
        [
            self.pc_lookback + 1,
            self.volume_ma_period,
            self.volume_rank_window,
            self.trend_period,
            self.slow_trend_period,
            atr_chain,
            self.roc_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Indicator values at one candle index
///
/// Every field is `None` until enough history exists to compute it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    /// Percent change of open over `pc_lookback` bars
    pub pc: Option<f64>,
    pub volume_ma: Option<f64>,
    /// Percentile rank of volume in the trailing window (0-100)
    pub volume_percentile: Option<f64>,
    /// SMA of close over the trend period (20 by default)
    pub sma_fast: Option<f64>,
    /// SMA of close over 50 bars
    pub sma_slow: Option<f64>,
    pub tr: Option<f64>,
    pub atr: Option<f64>,
    /// Rolling mean of `atr`, only used by the volatility gate
    pub avg_atr: Option<f64>,
    pub roc: Option<f64>,
}

/// Recompute every indicator from scratch for the given candle sequence
///
/// Returns one snapshot per candle, aligned by index.
pub fn compute_snapshots(candles: &[Candle], settings: &IndicatorSettings) -> Vec<IndicatorSnapshot> {
    let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let pc = open_change_series(&opens, settings.pc_lookback);
    let volume_ma = sma_series(&volumes, settings.volume_ma_period);
    let volume_percentile = volume_percentile_series(&volumes, settings.volume_rank_window);
    let sma_fast = sma_series(&closes, settings.trend_period);
    let sma_slow = sma_series(&closes, settings.slow_trend_period);
    let tr = true_range_series(candles);
    let atr = atr_series(candles, settings.atr_period);
    let avg_atr = rolling_mean(&atr, settings.avg_atr_period);
    let roc = roc_series(&closes, settings.roc_period);

    (0..candles.len())
        .map(|i| IndicatorSnapshot {
            pc: pc[i],
            volume_ma: volume_ma[i],
            volume_percentile: volume_percentile[i],
            sma_fast: sma_fast[i],
            sma_slow: sma_slow[i],
            tr: tr[i],
            atr: atr[i],
            avg_atr: avg_atr[i],
            roc: roc[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_trending_candles(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let price = 2000.0 + i as f64;
                Candle {
                    timestamp: start + Duration::minutes(15 * i as i64),
                    open: price,
                    high: price + 5.0,
                    low: price - 5.0,
                    close: price + 1.0,
                    volume: 1000.0 + (i % 7) as f64 * 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_snapshot_alignment() {
        let candles = create_trending_candles(80);
        let snapshots = compute_snapshots(&candles, &IndicatorSettings::default());

        assert_eq!(snapshots.len(), candles.len());
    }

    #[test]
    fn test_fields_undefined_exactly_during_warmup() {
        let candles = create_trending_candles(100);
        let snapshots = compute_snapshots(&candles, &IndicatorSettings::default());

        // pc needs index >= 4
        assert!(snapshots[3].pc.is_none());
        assert!(snapshots[4].pc.is_some());

        // roc needs index >= 10
        assert!(snapshots[9].roc.is_none());
        assert!(snapshots[10].roc.is_some());

        // sma20 needs 20 samples, sma50 needs 50
        assert!(snapshots[18].sma_fast.is_none());
        assert!(snapshots[19].sma_fast.is_some());
        assert!(snapshots[48].sma_slow.is_none());
        assert!(snapshots[49].sma_slow.is_some());

        // volume percentile needs 50 samples
        assert!(snapshots[48].volume_percentile.is_none());
        assert!(snapshots[49].volume_percentile.is_some());

        // tr has no previous close at 0, atr needs 14 true ranges
        assert!(snapshots[0].tr.is_none());
        assert!(snapshots[13].atr.is_none());
        assert!(snapshots[14].atr.is_some());

        // avg_atr needs 20 defined atr values
        assert!(snapshots[32].avg_atr.is_none());
        assert!(snapshots[33].avg_atr.is_some());
    }

    #[test]
    fn test_trend_averages_follow_uptrend() {
        let candles = create_trending_candles(60);
        let snapshots = compute_snapshots(&candles, &IndicatorSettings::default());
        let last = snapshots.last().unwrap();

        assert!(last.sma_fast.unwrap() > last.sma_slow.unwrap());
        assert!(last.roc.unwrap() > 0.0);
    }

    #[test]
    fn test_custom_trend_period() {
        let candles = create_trending_candles(30);
        let settings = IndicatorSettings::default().with_trend_period(10);
        let snapshots = compute_snapshots(&candles, &settings);

        assert!(snapshots[8].sma_fast.is_none());
        assert!(snapshots[9].sma_fast.is_some());
    }

    #[test]
    fn test_warmup_candles() {
        // avg_atr is the slowest chain: 14 + 20
        assert_eq!(IndicatorSettings::default().warmup_candles(), 50);
        let settings = IndicatorSettings {
            avg_atr_period: 40,
            ..IndicatorSettings::default()
        };
        assert_eq!(settings.warmup_candles(), 54);
    }
}
