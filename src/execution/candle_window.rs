use crate::error::WindowError;
use crate::models::Candle;
use std::collections::VecDeque;

/// Default number of candles retained for indicator computation
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// Bounded rolling window of closed candles
///
/// Timestamps are strictly increasing. When the window is full the oldest
/// candle is evicted first. Owned by a single consumer, so no locking.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    capacity: usize,
    accepted: u64,
}

impl CandleWindow {
    /// Create a new candle window
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of candles to keep (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
            accepted: 0,
        }
    }

    /// Append a closed candle
    ///
    /// Fails with `OutOfOrderCandle` if the timestamp does not advance.
    /// If the window is full, removes the oldest candle.
    pub fn append(&mut self, candle: Candle) -> Result<(), WindowError> {
        if let Some(last) = self.candles.back() {
            if candle.timestamp <= last.timestamp {
                return Err(WindowError::OutOfOrderCandle {
                    last: last.timestamp,
                    received: candle.timestamp,
                });
            }
        }

        self.candles.push_back(candle);
        self.accepted += 1;

        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        // Moves data only when the ring has wrapped, about once per `capacity` appends
        self.candles.make_contiguous();

        Ok(())
    }

    /// Ordered view (oldest first) for indicator recomputation
    pub fn as_sequence(&self) -> &[Candle] {
        // append keeps the deque contiguous
        let (head, tail) = self.candles.as_slices();
        debug_assert!(tail.is_empty());
        head
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Stream-wide sequence number of the newest candle
    ///
    /// Unlike the position inside the window this keeps growing after the
    /// window fills, so candle spacing can be measured across evictions.
    pub fn latest_sequence(&self) -> Option<u64> {
        self.accepted.checked_sub(1)
    }
}

impl Default for CandleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
