use std::ops::RangeInclusive;

/// Splits an inclusive block interval into consecutive chunks, oldest first.
///
/// Every chunk is at most `chunk_size` blocks wide; the last one may be shorter.
#[derive(Debug, Clone)]
pub(crate) struct BlockChunks {
    next_start: u64,
    end: u64,
    chunk_size: u64,
    remaining: u64,
}

impl BlockChunks {
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    pub const fn new(start: u64, end: u64, chunk_size: u64) -> Self {
        assert!(chunk_size >= 1, "chunk_size must be at least 1");
        let remaining = if start > end { 0 } else { (end - start) / chunk_size + 1 };
        Self { next_start: start, end, chunk_size, remaining }
    }
}

impl Iterator for BlockChunks {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let chunk_start = self.next_start;
        let chunk_end = chunk_start.saturating_add(self.chunk_size - 1).min(self.end);
        self.next_start = chunk_end.saturating_add(1);

        Some(chunk_start..=chunk_end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}
