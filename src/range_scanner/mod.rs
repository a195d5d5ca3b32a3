//! Chunked, order-normalising swap scans over a block interval.

mod chunks;

use std::ops::RangeInclusive;

use crate::{
    EventSource, RoundsError,
    types::{PoolContext, SwapLog},
};
use chunks::BlockChunks;

/// Default maximum number of blocks queried per `eth_getLogs` request.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 1200;

/// Scans a block interval for swaps in bounded sub-ranges.
///
/// Sub-ranges are queried oldest first, and the concatenated result is re-sorted by
/// `(block_number, log_index)` regardless of the order the source returned it in. A failure in
/// any sub-range fails the whole scan; nothing from earlier sub-ranges is returned.
#[derive(Debug, Clone)]
pub struct RangeScanner<S> {
    source: S,
    max_block_range: u64,
}

impl<S: EventSource> RangeScanner<S> {
    /// # Errors
    ///
    /// Returns [`RoundsError::InvalidMaxBlockRange`] if `max_block_range` is 0.
    pub fn new(source: S, max_block_range: u64) -> Result<Self, RoundsError> {
        if max_block_range == 0 {
            return Err(RoundsError::InvalidMaxBlockRange);
        }
        Ok(Self { source, max_block_range })
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn max_block_range(&self) -> u64 {
        self.max_block_range
    }

    /// Returns every swap of `pool` in `[from_block, to_block]`, oldest first.
    ///
    /// An inverted interval yields an empty list without querying the source.
    ///
    /// # Errors
    ///
    /// Propagates the first sub-range error from the event source.
    pub async fn scan(
        &self,
        pool: &PoolContext,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<SwapLog>, RoundsError> {
        if from_block > to_block {
            return Ok(Vec::new());
        }

        let mut swaps = Vec::new();
        for chunk in BlockChunks::new(from_block, to_block, self.max_block_range) {
            swaps.extend(self.fetch_chunk(pool, chunk).await?);
        }

        swaps.sort_by_key(SwapLog::ordering_key);

        debug!(
            from_block = from_block,
            to_block = to_block,
            swap_count = swaps.len(),
            "Scanned block range"
        );

        Ok(swaps)
    }

    async fn fetch_chunk(
        &self,
        pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<SwapLog>, RoundsError> {
        match self.source.swaps(pool, range.clone()).await {
            Ok(swaps) => {
                if !swaps.is_empty() {
                    trace!(swap_count = swaps.len(), block_range = ?range, "Found swaps in chunk");
                }
                Ok(swaps)
            }
            Err(e) => {
                warn!(error = %e, block_range = ?range, "Failed to fetch swaps for chunk");
                Err(e)
            }
        }
    }
}
