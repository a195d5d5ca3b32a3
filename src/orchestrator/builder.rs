use alloy::primitives::Address;
use chrono::Utc;

use crate::{
    EventSource, MetricSource, RoundsError, VariantClassifier,
    history::{HistoryCapacity, HistoryStore},
    orchestrator::{KeeperState, RoundKeeper},
    range_scanner::{DEFAULT_MAX_BLOCK_RANGE, RangeScanner},
    round::Round,
    types::{LogEntry, LogKind, PoolContext, RoundId, mask_address},
};

/// Builder/configuration for a [`RoundKeeper`].
#[derive(Clone, Debug)]
pub struct RoundKeeperBuilder {
    pool_address: Address,
    /// Maximum number of blocks per `eth_getLogs` request.
    pub max_block_range: u64,
    pub history_capacity: HistoryCapacity,
    durations: [u64; 2],
}

impl RoundKeeperBuilder {
    /// Creates a builder with default configuration for the pool at `pool_address`.
    #[must_use]
    pub fn new(pool_address: Address) -> Self {
        Self {
            pool_address,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            history_capacity: HistoryCapacity::default(),
            durations: RoundId::ALL.map(RoundId::default_duration_secs),
        }
    }

    /// Sets the maximum number of blocks per `eth_getLogs` request.
    ///
    /// Must be greater than 0.
    #[must_use]
    pub fn max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;
        self
    }

    /// Sets the capacities of the log, winner and swap histories.
    ///
    /// Each capacity must be greater than 0.
    #[must_use]
    pub fn history_capacity(mut self, history_capacity: HistoryCapacity) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    /// Overrides the duration of round `id`.
    ///
    /// A zero duration makes the round due on every pass.
    #[must_use]
    pub fn round_duration(mut self, id: RoundId, duration_secs: u64) -> Self {
        self.durations[id.index()] = duration_secs;
        self
    }

    #[must_use]
    pub fn duration_of(&self, id: RoundId) -> u64 {
        self.durations[id.index()]
    }

    /// Classifies the pool, opens one round per [`RoundId`] at the current chain height and
    /// returns the keeper.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero block range or capacity, and propagates
    /// classification or height lookup failures; none of them is recoverable at this stage.
    pub async fn connect<S: EventSource, M: MetricSource>(
        self,
        source: S,
        metric: M,
        classifier: &impl VariantClassifier,
    ) -> Result<RoundKeeper<S, M>, RoundsError> {
        let scanner = RangeScanner::new(source, self.max_block_range)?;
        let capacity = self.history_capacity.validate()?;

        let variant = classifier.classify(self.pool_address).await?;
        let pool = PoolContext { address: self.pool_address, variant };
        let start_block = scanner.source().current_height().await?;

        let now = Utc::now();
        let rounds =
            RoundId::ALL.map(|id| Round::new(id, self.durations[id.index()], now, start_block));

        let mut history = HistoryStore::new(capacity);
        history.push_log(LogEntry::new(
            LogKind::Info,
            format!("Initialized. Pool {} ({variant})", mask_address(&pool.address)),
            now,
        ));

        info!(
            pool = %pool.address,
            variant = %variant,
            start_block = start_block,
            max_block_range = self.max_block_range,
            "Round keeper initialized"
        );

        Ok(RoundKeeper::new(pool, scanner, metric, KeeperState { rounds, history }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{MockChain, StaticClassifier, StaticMetric},
        types::PoolVariant,
    };

    fn pool() -> Address {
        Address::repeat_byte(0x42)
    }

    #[test]
    fn defaults() {
        let builder = RoundKeeperBuilder::new(pool());

        assert_eq!(builder.max_block_range, DEFAULT_MAX_BLOCK_RANGE);
        assert_eq!(builder.history_capacity, HistoryCapacity::default());
        assert_eq!(builder.duration_of(RoundId::Main), 60);
        assert_eq!(builder.duration_of(RoundId::Hourly), 3600);
    }

    #[test]
    fn setters_override_defaults() {
        let builder = RoundKeeperBuilder::new(pool())
            .max_block_range(10)
            .round_duration(RoundId::Hourly, 120)
            .history_capacity(HistoryCapacity { logs: 5, winners: 4, swaps: 3 });

        assert_eq!(builder.max_block_range, 10);
        assert_eq!(builder.duration_of(RoundId::Main), 60);
        assert_eq!(builder.duration_of(RoundId::Hourly), 120);
        assert_eq!(builder.history_capacity.swaps, 3);
    }

    #[tokio::test]
    async fn connect_opens_every_round_at_current_height() -> anyhow::Result<()> {
        let keeper = RoundKeeperBuilder::new(pool())
            .connect(
                MockChain::new(777),
                StaticMetric::new(None),
                &StaticClassifier(PoolVariant::V3),
            )
            .await?;

        let snapshot = keeper.snapshot();
        assert_eq!(snapshot.state.pool_type, PoolVariant::V3);
        assert_eq!(snapshot.state.rounds.len(), RoundId::ALL.len());
        for round in &snapshot.state.rounds {
            assert_eq!(round.start_block, 777);
            assert_eq!(round.last_scanned_block, 777);
        }
        assert_eq!(snapshot.state.logs.len(), 1);
        assert_eq!(snapshot.state.logs[0].message, "Initialized. Pool 0x4242...4242 (V3)");
        Ok(())
    }

    #[tokio::test]
    async fn connect_rejects_zero_block_range() {
        let result = RoundKeeperBuilder::new(pool())
            .max_block_range(0)
            .connect(MockChain::new(1), StaticMetric::new(None), &StaticClassifier(PoolVariant::V2))
            .await;

        assert!(matches!(result, Err(RoundsError::InvalidMaxBlockRange)));
    }

    #[tokio::test]
    async fn connect_rejects_zero_capacity() {
        let result = RoundKeeperBuilder::new(pool())
            .history_capacity(HistoryCapacity { logs: 0, ..HistoryCapacity::default() })
            .connect(MockChain::new(1), StaticMetric::new(None), &StaticClassifier(PoolVariant::V2))
            .await;

        assert!(matches!(result, Err(RoundsError::InvalidCapacity("Log"))));
    }

    #[tokio::test]
    async fn connect_fails_when_height_is_unavailable() {
        let chain = MockChain::new(1);
        chain.fail_height(true);

        let result = RoundKeeperBuilder::new(pool())
            .connect(chain, StaticMetric::new(None), &StaticClassifier(PoolVariant::V2))
            .await;

        assert!(matches!(result, Err(RoundsError::Timeout)));
    }
}
