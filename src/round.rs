//! Lifecycle of a single round: incremental advancement, closure and replacement.

use alloy::primitives::Address;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    EventSource, RoundsError,
    history::HistoryStore,
    range_scanner::RangeScanner,
    types::{LogEntry, LogKind, PoolContext, RoundId, SwapEvent, WinnerRecord, mask_address},
};

/// Whether a round still accepts swaps or is waiting to be closed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    Active,
    Due,
}

/// One live round.
///
/// A round is never reopened: closing it is always followed by [`Round::reset`], which builds a
/// replacement, so a stale cursor can never leak into the next period.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: RoundId,
    #[serde(rename = "durationSec")]
    pub duration_secs: u64,
    #[serde(rename = "startedAtMs", with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "endsAtMs", with = "chrono::serde::ts_milliseconds")]
    pub ends_at: DateTime<Utc>,
    #[serde_as(as = "DisplayFromStr")]
    pub start_block: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub last_scanned_block: u64,
    #[serde(rename = "buys")]
    pub buy_count: u64,
    pub last_buyer: Option<Address>,
    pub payout_metric_usd: f64,
    /// Last block already decided by the round this one replaced.
    #[serde(skip)]
    pub settled_through: Option<u64>,
}

impl Round {
    #[must_use]
    pub fn new(id: RoundId, duration_secs: u64, started_at: DateTime<Utc>, start_block: u64) -> Self {
        let duration = TimeDelta::try_seconds(i64::try_from(duration_secs).unwrap_or(i64::MAX))
            .unwrap_or(TimeDelta::MAX);
        Self {
            id,
            duration_secs,
            started_at,
            ends_at: started_at.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC),
            start_block,
            last_scanned_block: start_block,
            buy_count: 0,
            last_buyer: None,
            payout_metric_usd: 0.0,
            settled_through: None,
        }
    }

    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> RoundStatus {
        if now >= self.ends_at { RoundStatus::Due } else { RoundStatus::Active }
    }

    /// Folds swaps from `last_scanned_block + 1` through `to_block` into the round.
    ///
    /// Returns the number of swaps found. Nothing changes (no history entries, cursor untouched)
    /// if there are no new blocks or the scan fails.
    ///
    /// # Errors
    ///
    /// Propagates scan errors from the event source.
    pub async fn advance<S: EventSource>(
        &mut self,
        scanner: &RangeScanner<S>,
        pool: &PoolContext,
        history: &mut HistoryStore,
        to_block: u64,
        now: DateTime<Utc>,
    ) -> Result<usize, RoundsError> {
        let from_block = self.last_scanned_block.saturating_add(1);
        if from_block > to_block {
            trace!(round = %self.id, to_block = to_block, "No new blocks");
            return Ok(0);
        }

        let swaps = scanner.scan(pool, from_block, to_block).await?;

        if let Some(last) = swaps.last() {
            self.buy_count += swaps.len() as u64;
            self.last_buyer = Some(last.buyer);

            let recent_from = swaps.len().saturating_sub(history.swap_capacity());
            history.push_swaps(
                swaps[recent_from..].iter().map(|swap| SwapEvent::observed(self.id, swap, now)),
            );

            history.push_log(
                LogEntry::new(
                    LogKind::Trade,
                    format!(
                        "{} swap(s): +{} | last buyer {}",
                        self.id.label(),
                        swaps.len(),
                        mask_address(&last.buyer)
                    ),
                    now,
                )
                .with_tx(last.tx_hash),
            );
        }
        self.last_scanned_block = to_block;

        debug!(
            round = %self.id,
            from_block = from_block,
            to_block = to_block,
            swap_count = swaps.len(),
            buy_count = self.buy_count,
            "Advanced round"
        );

        Ok(swaps.len())
    }

    /// Decides the round's winner from every swap in `[start_block, current_block]`.
    ///
    /// The scan ignores the incremental cursor, so the decision does not depend on how the
    /// round was advanced. A replacement round skips its start block, which the closing scan of
    /// its predecessor already covered. The winner is the buyer of the last swap in
    /// `(block_number, log_index)` order. With no swaps, a single info entry is logged and
    /// `None` is returned. The round itself is left as is.
    ///
    /// # Errors
    ///
    /// Propagates scan errors; in that case the history is not touched.
    pub async fn close<S: EventSource>(
        &self,
        scanner: &RangeScanner<S>,
        pool: &PoolContext,
        history: &mut HistoryStore,
        current_block: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<WinnerRecord>, RoundsError> {
        let from_block = self.settled_through.map_or(self.start_block, |b| b.saturating_add(1));
        let swaps = scanner.scan(pool, from_block, current_block).await?;

        let Some(last) = swaps.last() else {
            info!(round = %self.id, "Round ended without swaps");
            history.push_log(LogEntry::new(
                LogKind::Info,
                format!("{} ended: no swaps", self.id.label()),
                now,
            ));
            return Ok(None);
        };

        let winner = WinnerRecord {
            round_id: self.id,
            wallet: last.buyer,
            won_at: now,
            payout_metric_usd: self.payout_metric_usd,
            tx_hash: Some(last.tx_hash),
        };

        info!(
            round = %self.id,
            winner = %winner.wallet,
            swap_count = swaps.len(),
            payout_metric_usd = self.payout_metric_usd,
            "Round winner decided"
        );

        history.push_winner(winner.clone());
        history.push_log(
            LogEntry::new(
                LogKind::Win,
                format!(
                    "{} winner: {} | metric {:.4} USD",
                    self.id.label(),
                    mask_address(&winner.wallet),
                    self.payout_metric_usd
                ),
                now,
            )
            .with_tx(last.tx_hash),
        );

        Ok(Some(winner))
    }

    /// Builds the replacement round starting at `new_start_block`, the block this round was
    /// closed at.
    ///
    /// The payout metric is carried over until the next refresh.
    #[must_use]
    pub fn reset(&self, new_start_block: u64, now: DateTime<Utc>) -> Round {
        Round {
            payout_metric_usd: self.payout_metric_usd,
            settled_through: Some(new_start_block),
            ..Round::new(self.id, self.duration_secs, now, new_start_block)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        history::HistoryCapacity,
        test_utils::{MockChain, buyer, swap_at},
        types::PoolVariant,
    };

    fn pool() -> PoolContext {
        PoolContext { address: Address::repeat_byte(0x42), variant: PoolVariant::V2 }
    }

    fn round_at(start_block: u64) -> Round {
        Round::new(RoundId::Main, 60, Utc::now(), start_block)
    }

    #[test]
    fn new_round_has_consistent_timing_and_cursor() {
        let started_at = Utc::now();
        let round = Round::new(RoundId::Hourly, 3600, started_at, 500);

        assert_eq!(round.ends_at - round.started_at, TimeDelta::seconds(3600));
        assert_eq!(round.start_block, 500);
        assert_eq!(round.last_scanned_block, 500);
        assert_eq!(round.status(started_at), RoundStatus::Active);
        assert_eq!(round.status(round.ends_at), RoundStatus::Due);
    }

    #[tokio::test]
    async fn advance_scenario_with_small_chunks() -> anyhow::Result<()> {
        let chain = MockChain::new(103);
        chain.push(swap_at(100, 0, 0xaa));
        chain.push(swap_at(101, 0, 0xbb));
        chain.push(swap_at(103, 0, 0xcc));
        let scanner = RangeScanner::new(chain, 2)?;
        let mut history = HistoryStore::default();
        // The start block itself is folded by `close`, not by `advance`.
        let mut round = round_at(99);

        let found = round.advance(&scanner, &pool(), &mut history, 103, Utc::now()).await?;

        assert_eq!(found, 3);
        assert_eq!(round.buy_count, 3);
        assert_eq!(round.last_buyer, Some(buyer(0xcc)));
        assert_eq!(round.last_scanned_block, 103);

        let winner = round.close(&scanner, &pool(), &mut history, 103, Utc::now()).await?;
        assert_eq!(winner.map(|w| w.wallet), Some(buyer(0xcc)));
        Ok(())
    }

    #[tokio::test]
    async fn start_block_swaps_count_only_at_close() -> anyhow::Result<()> {
        let chain = MockChain::new(103);
        chain.push(swap_at(100, 0, 0xaa));
        chain.push(swap_at(101, 0, 0xbb));
        chain.push(swap_at(103, 0, 0xcc));
        let scanner = RangeScanner::new(chain.clone(), 2)?;
        let mut history = HistoryStore::default();
        let mut round = round_at(100);

        let found = round.advance(&scanner, &pool(), &mut history, 103, Utc::now()).await?;

        assert_eq!(found, 2);
        assert_eq!(round.buy_count, 2);
        assert_eq!(round.last_buyer, Some(buyer(0xcc)));
        assert_eq!(chain.queried_ranges(), vec![101..=102, 103..=103]);

        chain.clear_queries();
        let winner = round.close(&scanner, &pool(), &mut history, 103, Utc::now()).await?;
        assert_eq!(winner.map(|w| w.wallet), Some(buyer(0xcc)));
        assert_eq!(chain.queried_ranges()[0], 100..=101);
        Ok(())
    }

    #[tokio::test]
    async fn replacement_round_does_not_reclaim_the_boundary_block() -> anyhow::Result<()> {
        let chain = MockChain::new(103);
        chain.push(swap_at(103, 0, 0x07));
        let scanner = RangeScanner::new(chain.clone(), 1200)?;
        let mut history = HistoryStore::default();
        let round = round_at(100);

        let first = round.close(&scanner, &pool(), &mut history, 103, Utc::now()).await?;
        assert_eq!(first.map(|w| w.wallet), Some(buyer(0x07)));

        let next = round.reset(103, Utc::now());
        assert_eq!((next.start_block, next.last_scanned_block), (103, 103));
        chain.clear_queries();

        let second = next.close(&scanner, &pool(), &mut history, 103, Utc::now()).await?;
        assert!(second.is_none());
        assert!(chain.queried_ranges().is_empty());
        assert_eq!(history.winner_count(), 1);

        // A later swap in the replacement round still wins it.
        chain.push(swap_at(104, 0, 0x08));
        let third = next.close(&scanner, &pool(), &mut history, 104, Utc::now()).await?;
        assert_eq!(third.map(|w| w.wallet), Some(buyer(0x08)));
        assert_eq!(chain.queried_ranges(), vec![104..=104]);
        Ok(())
    }

    #[tokio::test]
    async fn advance_without_new_blocks_is_a_no_op() -> anyhow::Result<()> {
        let chain = MockChain::new(120);
        let scanner = RangeScanner::new(chain.clone(), 1200)?;
        let mut history = HistoryStore::default();
        let mut round = round_at(120);
        let before = round.clone();

        let found = round.advance(&scanner, &pool(), &mut history, 120, Utc::now()).await?;

        assert_eq!(found, 0);
        assert_eq!(round, before);
        assert_eq!(history.log_count(), 0);
        assert!(chain.queried_ranges().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn higher_log_index_wins_within_a_block() -> anyhow::Result<()> {
        let chain = MockChain::new(110).reversed_output();
        chain.push(swap_at(105, 7, 0x02));
        chain.push(swap_at(105, 3, 0x01));
        let scanner = RangeScanner::new(chain, 1200)?;
        let mut history = HistoryStore::default();
        let mut round = round_at(100);

        round.advance(&scanner, &pool(), &mut history, 110, Utc::now()).await?;

        assert_eq!(round.last_buyer, Some(buyer(0x02)));
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_moves_cursor_without_log() -> anyhow::Result<()> {
        let chain = MockChain::new(150);
        let scanner = RangeScanner::new(chain, 1200)?;
        let mut history = HistoryStore::default();
        let mut round = round_at(100);

        round.advance(&scanner, &pool(), &mut history, 150, Utc::now()).await?;

        assert_eq!(round.last_scanned_block, 150);
        assert_eq!(round.buy_count, 0);
        assert_eq!(round.last_buyer, None);
        assert_eq!(history.log_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_scan_leaves_round_untouched() -> anyhow::Result<()> {
        let chain = MockChain::new(130);
        chain.push(swap_at(105, 0, 0x01));
        chain.fail_range_containing(125);
        let scanner = RangeScanner::new(chain.clone(), 10)?;
        let mut history = HistoryStore::default();
        let mut round = round_at(100);
        let before = round.clone();

        let result = round.advance(&scanner, &pool(), &mut history, 130, Utc::now()).await;

        assert!(matches!(result, Err(RoundsError::Timeout)));
        assert_eq!(round, before);
        assert_eq!(history.swap_count(), 0);

        chain.heal();
        chain.clear_queries();
        round.advance(&scanner, &pool(), &mut history, 130, Utc::now()).await?;
        assert_eq!(chain.queried_ranges()[0], 101..=110);
        assert_eq!(round.buy_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn only_most_recent_swaps_reach_history_newest_first() -> anyhow::Result<()> {
        let chain = MockChain::new(200);
        for block in 101..=130 {
            chain.push(swap_at(block, 0, 0x10));
        }
        let scanner = RangeScanner::new(chain, 1200)?;
        let mut history =
            HistoryStore::new(HistoryCapacity { swaps: 20, ..HistoryCapacity::default() });
        let mut round = round_at(100);

        round.advance(&scanner, &pool(), &mut history, 200, Utc::now()).await?;

        let swaps = history.swaps();
        assert_eq!(round.buy_count, 30);
        assert_eq!(swaps.len(), 20);
        assert_eq!(swaps.first().map(|s| s.block_number), Some(130));
        assert_eq!(swaps.last().map(|s| s.block_number), Some(111));
        assert_eq!(history.log_count(), 1);
        assert_eq!(history.latest_log().map(|l| l.kind), Some(LogKind::Trade));
        Ok(())
    }

    #[tokio::test]
    async fn close_without_swaps_logs_once_and_declares_nobody() -> anyhow::Result<()> {
        let chain = MockChain::new(150);
        let scanner = RangeScanner::new(chain, 1200)?;
        let mut history = HistoryStore::default();
        let round = round_at(100);

        let winner = round.close(&scanner, &pool(), &mut history, 150, Utc::now()).await?;

        assert!(winner.is_none());
        assert_eq!(history.winner_count(), 0);
        assert_eq!(history.log_count(), 1);
        assert_eq!(history.latest_log().map(|l| l.kind), Some(LogKind::Info));
        Ok(())
    }

    #[tokio::test]
    async fn close_picks_last_swap_regardless_of_chunking() -> anyhow::Result<()> {
        let chain = MockChain::new(400);
        chain.push(swap_at(100, 0, 0x01));
        chain.push(swap_at(250, 2, 0x02));
        chain.push(swap_at(250, 9, 0x03));
        chain.push(swap_at(399, 0, 0x01));
        chain.push(swap_at(399, 1, 0x04));

        for chunk in [1, 7, 150, 1200] {
            let scanner = RangeScanner::new(chain.clone(), chunk)?;
            let mut history = HistoryStore::default();
            let mut round = round_at(100);
            round.payout_metric_usd = 12.5;
            round.advance(&scanner, &pool(), &mut history, 260, Utc::now()).await?;
            round.advance(&scanner, &pool(), &mut history, 400, Utc::now()).await?;

            let winner = round.close(&scanner, &pool(), &mut history, 400, Utc::now()).await?;

            let winner = winner.expect("round had swaps");
            assert_eq!(winner.wallet, buyer(0x04));
            assert_eq!(winner.payout_metric_usd, 12.5);
            assert_eq!(winner.tx_hash, Some(swap_at(399, 1, 0x04).tx_hash));
            assert_eq!(history.winner_count(), 1);
            assert_eq!(history.latest_log().map(|l| l.kind), Some(LogKind::Win));
        }
        Ok(())
    }

    #[tokio::test]
    async fn failed_close_records_nothing() -> anyhow::Result<()> {
        let chain = MockChain::new(150);
        chain.push(swap_at(120, 0, 0x01));
        chain.fail_range_containing(140);
        let scanner = RangeScanner::new(chain, 1200)?;
        let mut history = HistoryStore::default();
        let round = round_at(100);

        let result = round.close(&scanner, &pool(), &mut history, 150, Utc::now()).await;

        assert!(result.is_err());
        assert_eq!(history.log_count(), 0);
        assert_eq!(history.winner_count(), 0);
        Ok(())
    }

    #[test]
    fn reset_starts_fresh_but_keeps_metric() {
        let mut round = round_at(100);
        round.last_scanned_block = 180;
        round.buy_count = 9;
        round.last_buyer = Some(buyer(0x09));
        round.payout_metric_usd = 3.25;
        let now = Utc::now();

        let next = round.reset(181, now);

        assert_eq!(next.id, round.id);
        assert_eq!(next.duration_secs, round.duration_secs);
        assert_eq!(next.start_block, 181);
        assert_eq!(next.last_scanned_block, 181);
        assert_eq!(next.buy_count, 0);
        assert_eq!(next.last_buyer, None);
        assert_eq!(next.started_at, now);
        assert_eq!(next.payout_metric_usd, 3.25);
        assert_eq!(next.settled_through, Some(181));
        assert_eq!(round.settled_through, None);
    }

    #[test]
    fn serializes_blocks_as_strings() {
        let round = Round::new(RoundId::Main, 60, Utc::now(), 33_000_000);
        let json = serde_json::to_value(&round).unwrap();

        assert_eq!(json["startBlock"], "33000000");
        assert_eq!(json["lastScannedBlock"], "33000000");
        assert_eq!(json["id"], "main");
        assert_eq!(json["buys"], 0);
        assert!(json["lastBuyer"].is_null());
        assert!(json.get("settledThrough").is_none());
    }
}
