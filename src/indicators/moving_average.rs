/// Calculate Simple Moving Average (SMA) of the most recent `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Trailing rolling mean aligned with the input
///
/// Entry `i` is the mean of `values[i + 1 - window..=i]`. It is `None` until
/// `window` samples exist, and whenever any sample in the window is itself
/// undefined.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if window == 0 || i + 1 < window {
            out.push(None);
            continue;
        }

        let mean = values[i + 1 - window..=i]
            .iter()
            .copied()
            .sum::<Option<f64>>()
            .map(|sum| sum / window as f64);
        out.push(mean);
    }

    out
}

/// Rolling SMA series over plain prices
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let values: Vec<Option<f64>> = prices.iter().copied().map(Some).collect();
    rolling_mean(&values, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_sma_series_warmup() {
        let prices = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let series = sma_series(&prices, 3);

        assert_eq!(series, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_rolling_mean_propagates_undefined() {
        let values = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let series = rolling_mean(&values, 2);

        // Index 1 still sees the undefined first sample
        assert_eq!(series, vec![None, None, Some(3.0), Some(5.0)]);
    }
}
