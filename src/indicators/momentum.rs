/// Percent change of `values[i]` against `values[i - lookback]`
///
/// Undefined for the first `lookback` entries and when the base value is zero.
pub fn percent_change_series(values: &[f64], lookback: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if lookback == 0 || i < lookback {
                return None;
            }
            let base = values[i - lookback];
            if base == 0.0 {
                return None;
            }
            Some((values[i] - base) / base * 100.0)
        })
        .collect()
}

/// Order-block percent change: open price against the open `lookback` bars ago
pub fn open_change_series(opens: &[f64], lookback: usize) -> Vec<Option<f64>> {
    percent_change_series(opens, lookback)
}

/// Rate of change of closing prices over `period` bars
pub fn roc_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    percent_change_series(closes, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change_warmup() {
        let opens = vec![100.0, 101.0, 102.0, 103.0, 102.0, 98.0];
        let pc = open_change_series(&opens, 4);

        assert!(pc[..4].iter().all(Option::is_none));
        assert_eq!(pc[4], Some(2.0));
        let last = pc[5].unwrap();
        assert!((last - (98.0 - 101.0) / 101.0 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_sign() {
        let rising: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = (0..12).map(|i| 100.0 - i as f64).collect();

        assert!(roc_series(&rising, 10)[9].is_none());
        assert!(roc_series(&rising, 10)[10].unwrap() > 0.0);
        assert!(roc_series(&falling, 10)[11].unwrap() < 0.0);
    }

    #[test]
    fn test_zero_base_is_undefined() {
        let values = vec![0.0, 1.0];
        assert_eq!(percent_change_series(&values, 1), vec![None, None]);
    }
}
