#![allow(dead_code)]

use std::{ops::RangeInclusive, sync::Arc};

use alloy::primitives::Address;
use pool_rounds::{
    EventSource, PoolContext, PoolVariant, RoundId, RoundKeeper, RoundKeeperBuilder, RoundsError,
    SwapLog,
    test_utils::{MockChain, StaticClassifier, StaticMetric},
};
use tokio::sync::Semaphore;

pub const POOL: Address = Address::new([0x42; 20]);

pub struct KeeperSetup<S> {
    pub chain: MockChain,
    pub metric: StaticMetric,
    pub keeper: Arc<RoundKeeper<S, StaticMetric>>,
}

pub async fn setup_keeper(
    head: u64,
    configure: impl FnOnce(RoundKeeperBuilder) -> RoundKeeperBuilder,
) -> anyhow::Result<KeeperSetup<MockChain>> {
    let chain = MockChain::new(head);
    let metric = StaticMetric::new(Some(2.5));
    let keeper = configure(RoundKeeperBuilder::new(POOL))
        .connect(chain.clone(), metric.clone(), &StaticClassifier(PoolVariant::V3))
        .await?;
    Ok(KeeperSetup { chain, metric, keeper: Arc::new(keeper) })
}

/// Keeper whose main round is due on every pass.
pub async fn setup_due_main(head: u64) -> anyhow::Result<KeeperSetup<MockChain>> {
    setup_keeper(head, |builder| builder.round_duration(RoundId::Main, 0)).await
}

/// Event source whose swap queries wait until a permit is released.
#[derive(Clone)]
pub struct GatedChain {
    pub chain: MockChain,
    permits: Arc<Semaphore>,
}

impl GatedChain {
    pub fn new(chain: MockChain) -> Self {
        Self { chain, permits: Arc::new(Semaphore::new(0)) }
    }

    pub fn release(&self, queries: usize) {
        self.permits.add_permits(queries);
    }
}

impl EventSource for GatedChain {
    async fn current_height(&self) -> Result<u64, RoundsError> {
        self.chain.current_height().await
    }

    async fn swaps(
        &self,
        pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<SwapLog>, RoundsError> {
        self.permits.acquire().await.map_err(|_| RoundsError::Timeout)?.forget();
        self.chain.swaps(pool, range).await
    }
}

pub async fn setup_gated_keeper(
    head: u64,
) -> anyhow::Result<(KeeperSetup<GatedChain>, GatedChain)> {
    let chain = MockChain::new(head);
    let gated = GatedChain::new(chain.clone());
    let metric = StaticMetric::new(None);
    let keeper = RoundKeeperBuilder::new(POOL)
        .connect(gated.clone(), metric.clone(), &StaticClassifier(PoolVariant::V2))
        .await?;
    Ok((KeeperSetup { chain, metric, keeper: Arc::new(keeper) }, gated))
}
