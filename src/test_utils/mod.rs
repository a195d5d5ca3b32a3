//! In-memory collaborators for exercising the keeper without a node.

use std::{
    ops::RangeInclusive,
    sync::{Arc, Mutex, MutexGuard},
};

use alloy::primitives::{Address, B256};

use crate::{
    EventSource, MetricSource, RoundsError, VariantClassifier,
    types::{PoolContext, PoolVariant, SwapLog},
};

/// Address whose every byte is `byte`.
#[must_use]
pub fn buyer(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// A swap at `(block, log_index)` bought by [`buyer(buyer_byte)`](buyer).
///
/// The tx hash is derived from the block and log index so distinct positions never collide.
#[must_use]
pub fn swap_at(block: u64, log_index: u64, buyer_byte: u8) -> SwapLog {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&block.to_be_bytes());
    hash[8..16].copy_from_slice(&log_index.to_be_bytes());
    SwapLog { tx_hash: B256::from(hash), block_number: block, log_index, buyer: buyer(buyer_byte) }
}

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    swaps: Vec<SwapLog>,
    queried: Vec<RangeInclusive<u64>>,
    failing_blocks: Vec<u64>,
    height_fails: bool,
    reversed: bool,
}

/// Scriptable [`EventSource`]; clones share the same chain.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    #[must_use]
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.state().head = head;
        chain
    }

    /// Answer every query in descending `(block, log_index)` order.
    #[must_use]
    pub fn reversed_output(self) -> Self {
        self.state().reversed = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().expect("mock chain lock poisoned")
    }

    pub fn push(&self, swap: SwapLog) {
        self.state().swaps.push(swap);
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    #[must_use]
    pub fn head(&self) -> u64 {
        self.state().head
    }

    /// Any query whose range contains `block` fails with [`RoundsError::Timeout`].
    pub fn fail_range_containing(&self, block: u64) {
        self.state().failing_blocks.push(block);
    }

    pub fn fail_height(&self, fails: bool) {
        self.state().height_fails = fails;
    }

    pub fn heal(&self) {
        let mut state = self.state();
        state.failing_blocks.clear();
        state.height_fails = false;
    }

    #[must_use]
    pub fn queried_ranges(&self) -> Vec<RangeInclusive<u64>> {
        self.state().queried.clone()
    }

    pub fn clear_queries(&self) {
        self.state().queried.clear();
    }
}

impl EventSource for MockChain {
    async fn current_height(&self) -> Result<u64, RoundsError> {
        let state = self.state();
        if state.height_fails {
            return Err(RoundsError::Timeout);
        }
        Ok(state.head)
    }

    async fn swaps(
        &self,
        _pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<SwapLog>, RoundsError> {
        let mut state = self.state();
        state.queried.push(range.clone());

        if state.failing_blocks.iter().any(|block| range.contains(block)) {
            return Err(RoundsError::Timeout);
        }

        let mut swaps: Vec<SwapLog> =
            state.swaps.iter().filter(|swap| range.contains(&swap.block_number)).cloned().collect();
        swaps.sort_by_key(SwapLog::ordering_key);
        if state.reversed {
            swaps.reverse();
        }
        Ok(swaps)
    }
}

/// [`MetricSource`] answering with a fixed, replaceable value.
#[derive(Debug, Clone)]
pub struct StaticMetric {
    value: Arc<Mutex<Result<Option<f64>, RoundsError>>>,
}

impl StaticMetric {
    #[must_use]
    pub fn new(value: Option<f64>) -> Self {
        Self { value: Arc::new(Mutex::new(Ok(value))) }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self { value: Arc::new(Mutex::new(Err(RoundsError::MetricSource("unreachable".into())))) }
    }

    pub fn set(&self, value: Option<f64>) {
        *self.value.lock().expect("metric lock poisoned") = Ok(value);
    }
}

impl MetricSource for StaticMetric {
    async fn estimate_usd(&self, _pool: Address) -> Result<Option<f64>, RoundsError> {
        self.value.lock().expect("metric lock poisoned").clone()
    }
}

/// [`VariantClassifier`] that always answers with the same variant.
#[derive(Debug, Clone, Copy)]
pub struct StaticClassifier(pub PoolVariant);

impl VariantClassifier for StaticClassifier {
    async fn classify(&self, _pool: Address) -> Result<PoolVariant, RoundsError> {
        Ok(self.0)
    }
}
