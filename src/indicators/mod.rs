// Technical indicators module
// Pure functions of the candle sequence: percent change, volume rank,
// trend averages, ATR and rate of change

pub mod atr;
pub mod momentum;
pub mod moving_average;
pub mod snapshot;
pub mod volume;

pub use atr::{atr_series, is_volatility_acceptable, true_range_series};
pub use momentum::{open_change_series, percent_change_series, roc_series};
pub use moving_average::{calculate_sma, rolling_mean, sma_series};
pub use snapshot::{compute_snapshots, IndicatorSettings, IndicatorSnapshot};
pub use volume::{percentile_rank, volume_percentile_series};
