/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The average is a plain trailing mean (not Wilder's smoothing).

use super::moving_average::rolling_mean;
use crate::models::Candle;

/// True range per candle; the first candle has no previous close and is undefined
pub fn true_range_series(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(candles.len());

    for i in 0..candles.len() {
        if i == 0 {
            out.push(None);
            continue;
        }

        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        out.push(Some(tr));
    }

    out
}

/// ATR series aligned with candles
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_range_series(candles), period)
}

/// Check whether ATR is within `multiplier` times its own rolling average
///
/// Returns `None` when either value is undefined.
pub fn is_volatility_acceptable(atr: Option<f64>, avg_atr: Option<f64>, multiplier: f64) -> Option<bool> {
    Some(atr? <= avg_atr? * multiplier)
}
