//! Seams to the outside world: block data, pool classification and the payout metric.

use std::ops::RangeInclusive;

use alloy::primitives::Address;

use crate::{
    RoundsError,
    types::{PoolContext, PoolVariant, SwapLog},
};

/// Source of chain height and qualifying swap logs.
///
/// Implementations must accept single-block ranges, return an empty list for ranges without
/// matches, and never omit a swap inside a range they answered for. Results need not be sorted.
pub trait EventSource: Send + Sync {
    /// Latest block height.
    fn current_height(&self) -> impl Future<Output = Result<u64, RoundsError>> + Send;

    /// Swaps emitted by `pool` within `range`, buyers already resolved for the pool variant.
    fn swaps(
        &self,
        pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> impl Future<Output = Result<Vec<SwapLog>, RoundsError>> + Send;
}

/// One-shot probe deciding how a pool's swaps are decoded.
pub trait VariantClassifier: Send + Sync {
    fn classify(
        &self,
        pool: Address,
    ) -> impl Future<Output = Result<PoolVariant, RoundsError>> + Send;
}

/// Source of the USD payout estimate cached on every round.
///
/// `Ok(None)` means "no estimate available"; callers treat it, like an error, as zero.
pub trait MetricSource: Send + Sync {
    fn estimate_usd(
        &self,
        pool: Address,
    ) -> impl Future<Output = Result<Option<f64>, RoundsError>> + Send;
}

impl<T: EventSource> EventSource for std::sync::Arc<T> {
    fn current_height(&self) -> impl Future<Output = Result<u64, RoundsError>> + Send {
        (**self).current_height()
    }

    fn swaps(
        &self,
        pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> impl Future<Output = Result<Vec<SwapLog>, RoundsError>> + Send {
        (**self).swaps(pool, range)
    }
}

impl<T: MetricSource> MetricSource for std::sync::Arc<T> {
    fn estimate_usd(
        &self,
        pool: Address,
    ) -> impl Future<Output = Result<Option<f64>, RoundsError>> + Send {
        (**self).estimate_usd(pool)
    }
}
