//! The round keeper: single owner of every round and of the shared history.
//!
//! All mutating triggers (scheduled ticks, an explicit reconciliation, an explicit closure) run
//! behind one gate and therefore never interleave. After each trigger an immutable
//! [`StateView`] is published; [`RoundKeeper::snapshot`] reads that view without touching the
//! gate, so readers observe a round either before or after a trigger, never half-way.

mod builder;

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    EventSource, MetricSource, RoundsError,
    history::HistoryStore,
    range_scanner::RangeScanner,
    round::{Round, RoundStatus},
    types::{LogEntry, LogKind, PoolContext, RoundId, Snapshot, StateView},
};

pub use builder::RoundKeeperBuilder;

/// State guarded by the keeper's gate.
#[derive(Debug)]
pub(crate) struct KeeperState {
    pub(crate) rounds: [Round; 2],
    pub(crate) history: HistoryStore,
}

impl KeeperState {
    fn view(&self, pool: &PoolContext) -> StateView {
        StateView {
            pool_address: pool.address,
            pool_type: pool.variant,
            rounds: self.rounds.to_vec(),
            winners: self.history.winners(),
            logs: self.history.logs(),
            swaps: self.history.swaps(),
        }
    }
}

/// Outcome of one reconciliation pass.
///
/// A pass always visits every round; rounds that failed are listed in `failures` and keep their
/// previous state, so the next pass retries them.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub snapshot: Snapshot,
    pub failures: Vec<(RoundId, RoundsError)>,
}

impl PassReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives the rounds of one pool.
#[derive(Debug)]
pub struct RoundKeeper<S, M> {
    pool: PoolContext,
    scanner: RangeScanner<S>,
    metric: M,
    gate: Mutex<KeeperState>,
    published: ArcSwap<StateView>,
}

impl<S: EventSource, M: MetricSource> RoundKeeper<S, M> {
    pub(crate) fn new(
        pool: PoolContext,
        scanner: RangeScanner<S>,
        metric: M,
        state: KeeperState,
    ) -> Self {
        let published = ArcSwap::from_pointee(state.view(&pool));
        Self { pool, scanner, metric, gate: Mutex::new(state), published }
    }

    #[must_use]
    pub fn pool(&self) -> &PoolContext {
        &self.pool
    }

    /// Returns the last published state, stamped with the current time.
    ///
    /// Never waits for an in-flight trigger.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot { now: Utc::now(), state: self.published.load_full() }
    }

    /// Runs a full pass: metric refresh, then closure or advancement of every round.
    ///
    /// Waits for any trigger already in flight.
    ///
    /// # Errors
    ///
    /// Fails only if the chain height cannot be fetched; per-round failures are reported in
    /// [`PassReport::failures`].
    pub async fn reconcile(&self) -> Result<PassReport, RoundsError> {
        let mut state = self.gate.lock().await;
        self.run_pass(&mut state, true).await
    }

    /// Like [`RoundKeeper::reconcile`] but keeps the cached payout metric.
    ///
    /// # Errors
    ///
    /// See [`RoundKeeper::reconcile`].
    pub async fn advance_all(&self) -> Result<PassReport, RoundsError> {
        let mut state = self.gate.lock().await;
        self.run_pass(&mut state, false).await
    }

    /// Scheduled variant of a pass: returns `Ok(None)` without doing anything if another
    /// trigger holds the gate.
    ///
    /// # Errors
    ///
    /// See [`RoundKeeper::reconcile`].
    pub async fn try_tick(&self, refresh_metric: bool) -> Result<Option<PassReport>, RoundsError> {
        let Ok(mut state) = self.gate.try_lock() else {
            debug!(refresh_metric = refresh_metric, "Keeper busy, skipping tick");
            return Ok(None);
        };
        self.run_pass(&mut state, refresh_metric).await.map(Some)
    }

    /// Closes round `id` right away and replaces it with a fresh round starting at the current
    /// height, whether or not it was due.
    ///
    /// # Errors
    ///
    /// Returns [`RoundsError::InvalidRoundId`] for an unknown id before touching any state, or
    /// the upstream error that aborted the closure; the round is then left as it was.
    pub async fn close_round(&self, id: &str) -> Result<Snapshot, RoundsError> {
        let id: RoundId = id.parse()?;
        let mut state = self.gate.lock().await;

        let current_block = self.current_height().await?;
        let now = Utc::now();
        self.close_and_reset(&mut state, id, current_block, now).await?;

        Ok(self.publish(&state))
    }

    async fn run_pass(
        &self,
        state: &mut KeeperState,
        refresh_metric: bool,
    ) -> Result<PassReport, RoundsError> {
        let current_block = self.current_height().await?;

        if refresh_metric {
            let usd = self.refresh_metric().await;
            for round in &mut state.rounds {
                round.payout_metric_usd = usd;
            }
        }

        let now = Utc::now();
        let mut failures = Vec::new();
        for id in RoundId::ALL {
            if let Err(e) = self.process_round(state, id, current_block, now).await {
                error!(
                    round = %id,
                    current_block = current_block,
                    error = %e,
                    "Round processing failed"
                );
                failures.push((id, e));
            }
        }

        debug!(
            current_block = current_block,
            refresh_metric = refresh_metric,
            failed_rounds = failures.len(),
            "Reconciliation pass finished"
        );

        Ok(PassReport { snapshot: self.publish(state), failures })
    }

    async fn process_round(
        &self,
        state: &mut KeeperState,
        id: RoundId,
        current_block: u64,
        now: DateTime<Utc>,
    ) -> Result<(), RoundsError> {
        if state.rounds[id.index()].status(now) == RoundStatus::Due {
            return self.close_and_reset(state, id, current_block, now).await;
        }

        let KeeperState { rounds, history } = state;
        rounds[id.index()]
            .advance(&self.scanner, &self.pool, history, current_block, now)
            .await
            .map(|_| ())
    }

    async fn close_and_reset(
        &self,
        state: &mut KeeperState,
        id: RoundId,
        current_block: u64,
        now: DateTime<Utc>,
    ) -> Result<(), RoundsError> {
        let KeeperState { rounds, history } = state;
        let round = &mut rounds[id.index()];

        round.close(&self.scanner, &self.pool, history, current_block, now).await?;
        *round = round.reset(current_block, now);

        history.push_log(LogEntry::new(LogKind::Info, format!("{} round reset", id.label()), now));
        info!(round = %id, start_block = current_block, "Round reset");
        Ok(())
    }

    async fn current_height(&self) -> Result<u64, RoundsError> {
        self.scanner.source().current_height().await.inspect_err(|e| {
            warn!(error = %e, "Failed to fetch current block height");
        })
    }

    async fn refresh_metric(&self) -> f64 {
        match self.metric.estimate_usd(self.pool.address).await {
            Ok(Some(usd)) if usd.is_finite() && usd >= 0.0 => usd,
            Ok(Some(usd)) => {
                warn!(usd = usd, "Discarding invalid payout metric");
                0.0
            }
            Ok(None) => {
                debug!("No payout metric available");
                0.0
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh payout metric");
                0.0
            }
        }
    }

    fn publish(&self, state: &KeeperState) -> Snapshot {
        let view = Arc::new(state.view(&self.pool));
        self.published.store(Arc::clone(&view));
        Snapshot { now: Utc::now(), state: view }
    }
}
