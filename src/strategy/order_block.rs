use crate::indicators::{is_volatility_acceptable, IndicatorSnapshot};
use crate::models::Side;

/// Configuration for order-block signal detection
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    /// Break threshold as a fraction (0.015 = 1.5%)
    pub sensitivity: f64,
    /// Minimum volume percentile (0-100) at the break candle
    pub min_volume_percentile: f64,
    /// Minimum number of candles between two entries
    pub min_trades_distance: u64,
    /// ATR may not exceed this multiple of its rolling average
    pub volatility_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.015,
            min_volume_percentile: 50.0,
            min_trades_distance: 10,
            volatility_multiplier: 1.5,
        }
    }
}

impl SignalConfig {
    /// Break threshold in the percent units `pc` is expressed in
    pub fn threshold_pct(&self) -> f64 {
        self.sensitivity * 100.0
    }
}

/// Why a detected break was not promoted to a signal
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Cooldown { elapsed: u64, required: u64 },
    LowVolume { percentile: f64, required: f64 },
    TrendMisaligned,
    ExcessVolatility { atr: f64, limit: f64 },
    Undefined(&'static str),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Cooldown { elapsed, required } => {
                write!(f, "cooldown: {} candles since last entry, need {}", elapsed, required)
            }
            RejectReason::LowVolume { percentile, required } => {
                write!(f, "volume percentile {:.1} below {:.1}", percentile, required)
            }
            RejectReason::TrendMisaligned => write!(f, "trend not aligned"),
            RejectReason::ExcessVolatility { atr, limit } => {
                write!(f, "atr {:.4} above limit {:.4}", atr, limit)
            }
            RejectReason::Undefined(field) => write!(f, "{} undefined", field),
        }
    }
}

/// Outcome of evaluating the newest candle
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    NoBreak,
    Rejected { side: Side, reason: RejectReason },
    Signal(Side),
}

/// Scans the newest indicator values for order-block breaks
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    config: SignalConfig,
}

impl SignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Classify a percent-change crossing at `index`
    ///
    /// A bearish break is `pc` crossing down through `-sensitivity` while not
    /// already short; a bullish break is the mirror while not already long.
    /// Undefined `pc` values and simultaneous breaks yield no break.
    pub fn detect_break(
        &self,
        snapshots: &[IndicatorSnapshot],
        index: usize,
        position: Option<Side>,
    ) -> Option<Side> {
        if index == 0 || index >= snapshots.len() {
            return None;
        }

        let pc = snapshots[index].pc?;
        let prev_pc = snapshots[index - 1].pc?;
        let threshold = self.config.threshold_pct();

        let bearish = prev_pc > -threshold && pc <= -threshold && position != Some(Side::Short);
        let bullish = prev_pc < threshold && pc >= threshold && position != Some(Side::Long);

        match (bearish, bullish) {
            (true, false) => Some(Side::Short),
            (false, true) => Some(Side::Long),
            _ => None,
        }
    }

    /// Filters a break must pass before it becomes actionable
    ///
    /// Checked in order: cooldown, volume, trend alignment, volatility.
    pub fn is_valid_trade_condition(
        &self,
        snapshot: &IndicatorSnapshot,
        side: Side,
        sequence: u64,
        last_trade: Option<u64>,
    ) -> Result<(), RejectReason> {
        if let Some(last) = last_trade {
            let elapsed = sequence.saturating_sub(last);
            if elapsed < self.config.min_trades_distance {
                return Err(RejectReason::Cooldown {
                    elapsed,
                    required: self.config.min_trades_distance,
                });
            }
        }

        let percentile = snapshot
            .volume_percentile
            .ok_or(RejectReason::Undefined("volume_percentile"))?;
        if percentile < self.config.min_volume_percentile {
            return Err(RejectReason::LowVolume {
                percentile,
                required: self.config.min_volume_percentile,
            });
        }

        let sma_fast = snapshot.sma_fast.ok_or(RejectReason::Undefined("sma_fast"))?;
        let sma_slow = snapshot.sma_slow.ok_or(RejectReason::Undefined("sma_slow"))?;
        let roc = snapshot.roc.ok_or(RejectReason::Undefined("roc"))?;
        let aligned = match side {
            Side::Long => sma_fast > sma_slow && roc > 0.0,
            Side::Short => sma_fast < sma_slow && roc < 0.0,
        };
        if !aligned {
            return Err(RejectReason::TrendMisaligned);
        }

        let acceptable = is_volatility_acceptable(
            snapshot.atr,
            snapshot.avg_atr,
            self.config.volatility_multiplier,
        )
        .ok_or(RejectReason::Undefined("atr"))?;
        if !acceptable {
            let atr = snapshot.atr.unwrap_or_default();
            let limit = snapshot.avg_atr.unwrap_or_default() * self.config.volatility_multiplier;
            return Err(RejectReason::ExcessVolatility { atr, limit });
        }

        Ok(())
    }

    /// Evaluate the newest snapshot
    ///
    /// # Arguments
    /// * `index` - Position of the newest candle inside the window
    /// * `sequence` - Stream-wide sequence number of that candle
    /// * `position` - Side of the currently open position, if any
    /// * `last_trade` - Sequence number of the last entry, if any
    pub fn evaluate(
        &self,
        snapshots: &[IndicatorSnapshot],
        index: usize,
        sequence: u64,
        position: Option<Side>,
        last_trade: Option<u64>,
    ) -> Detection {
        let Some(side) = self.detect_break(snapshots, index, position) else {
            return Detection::NoBreak;
        };

        match self.is_valid_trade_condition(&snapshots[index], side, sequence, last_trade) {
            Ok(()) => Detection::Signal(side),
            Err(reason) => Detection::Rejected { side, reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Snapshot that passes every filter for a short entry
    fn bearish_snapshot(pc: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            pc: Some(pc),
            volume_ma: Some(1000.0),
            volume_percentile: Some(80.0),
            sma_fast: Some(1990.0),
            sma_slow: Some(2000.0),
            tr: Some(10.0),
            atr: Some(10.0),
            avg_atr: Some(9.0),
            roc: Some(-1.0),
        }
    }

    fn bullish_snapshot(pc: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            sma_fast: Some(2010.0),
            roc: Some(1.0),
            ..bearish_snapshot(pc)
        }
    }

    #[test]
    fn test_bearish_break_emits_short() {
        let detector = SignalDetector::default();
        let snapshots = vec![bearish_snapshot(0.5), bearish_snapshot(-1.6)];

        let detection = detector.evaluate(&snapshots, 1, 60, None, None);
        assert_eq!(detection, Detection::Signal(Side::Short));
    }

    #[test]
    fn test_bullish_break_emits_long() {
        let detector = SignalDetector::default();
        let snapshots = vec![bullish_snapshot(1.0), bullish_snapshot(1.6)];

        // Flips are allowed from the opposite side
        let detection = detector.evaluate(&snapshots, 1, 60, Some(Side::Short), None);
        assert_eq!(detection, Detection::Signal(Side::Long));
    }

    #[test]
    fn test_no_break_without_crossing() {
        let detector = SignalDetector::default();

        // Already below the threshold on the previous candle
        let snapshots = vec![bearish_snapshot(-1.7), bearish_snapshot(-2.0)];
        assert_eq!(detector.evaluate(&snapshots, 1, 60, None, None), Detection::NoBreak);

        // Move too small
        let snapshots = vec![bearish_snapshot(0.5), bearish_snapshot(-1.4)];
        assert_eq!(detector.evaluate(&snapshots, 1, 60, None, None), Detection::NoBreak);
    }

    #[test]
    fn test_no_break_in_direction_of_open_position() {
        let detector = SignalDetector::default();
        let snapshots = vec![bearish_snapshot(0.5), bearish_snapshot(-1.6)];

        assert_eq!(
            detector.evaluate(&snapshots, 1, 60, Some(Side::Short), None),
            Detection::NoBreak
        );
    }

    #[test]
    fn test_undefined_pc_yields_no_break() {
        let detector = SignalDetector::default();
        let mut first = bearish_snapshot(0.0);
        first.pc = None;
        let snapshots = vec![first, bearish_snapshot(-1.6)];

        assert_eq!(detector.evaluate(&snapshots, 1, 60, None, None), Detection::NoBreak);
        assert_eq!(detector.evaluate(&snapshots, 0, 60, None, None), Detection::NoBreak);
    }

    #[test]
    fn test_cooldown_gate() {
        let detector = SignalDetector::default();
        let snapshots = vec![bearish_snapshot(0.5), bearish_snapshot(-1.6)];

        let detection = detector.evaluate(&snapshots, 1, 59, None, Some(50));
        assert_eq!(
            detection,
            Detection::Rejected {
                side: Side::Short,
                reason: RejectReason::Cooldown {
                    elapsed: 9,
                    required: 10
                }
            }
        );

        // Exactly min_trades_distance apart is allowed
        let detection = detector.evaluate(&snapshots, 1, 60, None, Some(50));
        assert_eq!(detection, Detection::Signal(Side::Short));
    }

    #[test]
    fn test_volume_gate() {
        let detector = SignalDetector::default();
        let mut current = bearish_snapshot(-1.6);
        current.volume_percentile = Some(40.0);
        let snapshots = vec![bearish_snapshot(0.5), current];

        assert!(matches!(
            detector.evaluate(&snapshots, 1, 60, None, None),
            Detection::Rejected {
                reason: RejectReason::LowVolume { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_trend_gate() {
        let detector = SignalDetector::default();

        // Bearish break in an uptrend
        let snapshots = vec![bullish_snapshot(0.5), bullish_snapshot(-1.6)];
        assert_eq!(
            detector.evaluate(&snapshots, 1, 60, None, None),
            Detection::Rejected {
                side: Side::Short,
                reason: RejectReason::TrendMisaligned
            }
        );

        // Averages agree but momentum does not
        let mut current = bearish_snapshot(-1.6);
        current.roc = Some(0.2);
        let snapshots = vec![bearish_snapshot(0.5), current];
        assert!(matches!(
            detector.evaluate(&snapshots, 1, 60, None, None),
            Detection::Rejected {
                reason: RejectReason::TrendMisaligned,
                ..
            }
        ));
    }

    #[test]
    fn test_volatility_gate() {
        let detector = SignalDetector::default();
        let mut current = bearish_snapshot(-1.6);
        current.atr = Some(14.0);
        current.avg_atr = Some(9.0); // limit 13.5
        let snapshots = vec![bearish_snapshot(0.5), current];

        assert!(matches!(
            detector.evaluate(&snapshots, 1, 60, None, None),
            Detection::Rejected {
                reason: RejectReason::ExcessVolatility { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_undefined_filter_inputs_reject() {
        let detector = SignalDetector::default();
        let mut current = bearish_snapshot(-1.6);
        current.sma_slow = None;
        let snapshots = vec![bearish_snapshot(0.5), current];

        assert_eq!(
            detector.evaluate(&snapshots, 1, 60, None, None),
            Detection::Rejected {
                side: Side::Short,
                reason: RejectReason::Undefined("sma_slow")
            }
        );
    }
}
