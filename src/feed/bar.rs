use crate::models::Candle;

/// What a candlestick update did to the forming bar
#[derive(Debug, Clone, PartialEq)]
pub enum BarUpdate {
    /// First update of a new bar; nothing closed yet
    Started,
    /// Same bar, newer values
    Revised,
    /// A newer bar started; the returned bar is final
    Closed(Candle),
    /// Update for a bar older than the one forming
    Stale,
}

/// Tracks the bar the exchange is still revising
///
/// The candlestick channel resends the forming bar with the same start time
/// until the interval ends. Only the last revision of a bar is released, and
/// only once a bar with a later start time shows up.
#[derive(Debug, Clone, Default)]
pub struct FormingBar {
    current: Option<Candle>,
}

impl FormingBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    pub fn update(&mut self, candle: Candle) -> BarUpdate {
        let Some(current) = self.current.as_mut() else {
            self.current = Some(candle);
            return BarUpdate::Started;
        };

        if candle.timestamp == current.timestamp {
            *current = candle;
            BarUpdate::Revised
        } else if candle.timestamp > current.timestamp {
            let closed = std::mem::replace(current, candle);
            BarUpdate::Closed(closed)
        } else {
            BarUpdate::Stale
        }
    }
}
