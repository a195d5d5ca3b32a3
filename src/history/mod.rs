//! Bounded, newest-first histories of log entries, winners and swaps.

mod ring_buffer;

use std::collections::HashSet;

use alloy::primitives::B256;

use crate::{
    RoundsError,
    types::{LogEntry, RoundId, SwapEvent, WinnerRecord},
};
use ring_buffer::RingBuffer;

/// Default number of log entries kept.
pub const DEFAULT_LOG_CAPACITY: usize = 80;
/// Default number of winner records kept.
pub const DEFAULT_WINNER_CAPACITY: usize = 30;
/// Default number of swaps kept.
pub const DEFAULT_SWAP_CAPACITY: usize = 20;

/// Capacities of the three histories.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HistoryCapacity {
    pub logs: usize,
    pub winners: usize,
    pub swaps: usize,
}

impl Default for HistoryCapacity {
    fn default() -> Self {
        Self {
            logs: DEFAULT_LOG_CAPACITY,
            winners: DEFAULT_WINNER_CAPACITY,
            swaps: DEFAULT_SWAP_CAPACITY,
        }
    }
}

impl HistoryCapacity {
    pub(crate) fn validate(self) -> Result<Self, RoundsError> {
        if self.logs == 0 {
            return Err(RoundsError::InvalidCapacity("Log"));
        }
        if self.winners == 0 {
            return Err(RoundsError::InvalidCapacity("Winner"));
        }
        if self.swaps == 0 {
            return Err(RoundsError::InvalidCapacity("Swap"));
        }
        Ok(self)
    }
}

/// Recent activity shared by all rounds.
///
/// Records are never mutated once stored; they only leave by being evicted from the back.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    logs: RingBuffer<LogEntry>,
    winners: RingBuffer<WinnerRecord>,
    swaps: RingBuffer<SwapEvent>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(HistoryCapacity::default())
    }
}

impl HistoryStore {
    #[must_use]
    pub fn new(capacity: HistoryCapacity) -> Self {
        Self {
            logs: RingBuffer::new(capacity.logs),
            winners: RingBuffer::new(capacity.winners),
            swaps: RingBuffer::new(capacity.swaps),
        }
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        trace!(kind = ?entry.kind, message = %entry.message, "History log entry");
        self.logs.push_front(entry);
    }

    pub fn push_winner(&mut self, winner: WinnerRecord) {
        self.winners.push_front(winner);
    }

    /// Inserts `swaps` in iteration order, so the last item ends up in front.
    ///
    /// A swap whose `(round_id, tx_hash)` is already held (or appeared earlier in the same
    /// batch) is dropped. The check only covers what is currently stored: a swap that has been
    /// evicted is admitted again if it shows up later.
    ///
    /// Returns the number of swaps actually inserted.
    pub fn push_swaps(&mut self, swaps: impl IntoIterator<Item = SwapEvent>) -> usize {
        let mut seen: HashSet<(RoundId, B256)> =
            self.swaps.iter().map(SwapEvent::dedup_key).collect();
        let mut inserted = 0;

        for swap in swaps {
            if seen.insert(swap.dedup_key()) {
                self.swaps.push_front(swap);
                inserted += 1;
            }
        }

        inserted
    }

    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.to_vec()
    }

    #[must_use]
    pub fn winners(&self) -> Vec<WinnerRecord> {
        self.winners.to_vec()
    }

    #[must_use]
    pub fn swaps(&self) -> Vec<SwapEvent> {
        self.swaps.to_vec()
    }

    #[must_use]
    pub fn latest_log(&self) -> Option<&LogEntry> {
        self.logs.front()
    }

    #[must_use]
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    #[must_use]
    pub fn winner_count(&self) -> usize {
        self.winners.len()
    }

    #[must_use]
    pub fn swap_count(&self) -> usize {
        self.swaps.len()
    }

    /// Maximum number of swaps held at once.
    #[must_use]
    pub fn swap_capacity(&self) -> usize {
        self.swaps.capacity()
    }
}
