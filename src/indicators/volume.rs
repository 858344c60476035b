//! Volume analysis
//!
//! Percentile rank of the current volume inside a trailing window, used to
//! reject breaks that happen on thin participation.

/// Percentile rank (0-100) of the last sample within `window`
///
/// Ties count as inclusive: the rank is the share of samples that are less
/// than or equal to the last one.
pub fn percentile_rank(window: &[f64]) -> Option<f64> {
    let current = *window.last()?;
    let at_or_below = window.iter().filter(|&&v| v <= current).count();
    Some(at_or_below as f64 / window.len() as f64 * 100.0)
}

/// Trailing percentile rank series; undefined until `window` samples exist
pub fn volume_percentile_series(volumes: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..volumes.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                percentile_rank(&volumes[i + 1 - window..=i])
            }
        })
        .collect()
}
