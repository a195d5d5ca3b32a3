use std::{fmt, str::FromStr, sync::Arc};

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_with::{DisplayFromStr, serde_as};

use crate::{RoundsError, round::Round};

/// Identifier of one of the fixed lottery periods.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundId {
    Main,
    Hourly,
}

impl RoundId {
    /// Every round id, in the order a reconciliation pass visits them.
    pub const ALL: [RoundId; 2] = [RoundId::Main, RoundId::Hourly];

    #[must_use]
    pub const fn default_duration_secs(self) -> u64 {
        match self {
            RoundId::Main => 60,
            RoundId::Hourly => 60 * 60,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RoundId::Main => "main",
            RoundId::Hourly => "hourly",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            RoundId::Main => 0,
            RoundId::Hourly => 1,
        }
    }

    /// Upper-case label used in log messages.
    #[must_use]
    pub fn label(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundId {
    type Err = RoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(RoundId::Main),
            "hourly" => Ok(RoundId::Hourly),
            other => Err(RoundsError::InvalidRoundId(other.to_owned())),
        }
    }
}

/// Pool protocol variant; decides which `Swap` event is scanned and which field names the buyer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolVariant {
    /// Uniswap V2 style pool; the buyer is the event's `to`.
    V2,
    /// Uniswap V3 style pool; the buyer is the event's `recipient`.
    V3,
}

impl fmt::Display for PoolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolVariant::V2 => f.write_str("V2"),
            PoolVariant::V3 => f.write_str("V3"),
        }
    }
}

/// The pool being watched, fixed after start-up classification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolContext {
    pub address: Address,
    pub variant: PoolVariant,
}

/// A qualifying swap as returned by an [`EventSource`](crate::EventSource).
///
/// Ordered by `(block_number, log_index)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapLog {
    pub tx_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub buyer: Address,
}

impl SwapLog {
    #[must_use]
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// A swap attributed to a round and kept in the recent-swaps history.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    pub round_id: RoundId,
    pub tx_hash: B256,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: u64,
    pub log_index: u64,
    pub buyer: Address,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub observed_at: DateTime<Utc>,
}

impl SwapEvent {
    #[must_use]
    pub fn observed(round_id: RoundId, log: &SwapLog, observed_at: DateTime<Utc>) -> Self {
        Self {
            round_id,
            tx_hash: log.tx_hash,
            block_number: log.block_number,
            log_index: log.log_index,
            buyer: log.buyer,
            observed_at,
        }
    }

    pub(crate) fn dedup_key(&self) -> (RoundId, B256) {
        (self.round_id, self.tx_hash)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub round_id: RoundId,
    pub wallet: Address,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub won_at: DateTime<Utc>,
    pub payout_metric_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    Trade,
    Win,
    Payout,
    Claim,
    Info,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl LogEntry {
    #[must_use]
    pub fn new(kind: LogKind, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { kind, message: message.into(), at, tx_hash: None }
    }

    #[must_use]
    pub fn with_tx(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

/// Immutable view of the keeper state, republished after every mutating trigger.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateView {
    pub pool_address: Address,
    pub pool_type: PoolVariant,
    /// Serialized as an object keyed by round id.
    #[serde(serialize_with = "rounds_by_id")]
    pub rounds: Vec<Round>,
    pub winners: Vec<WinnerRecord>,
    pub logs: Vec<LogEntry>,
    pub swaps: Vec<SwapEvent>,
}

impl StateView {
    #[must_use]
    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == id)
    }
}

fn rounds_by_id<S: Serializer>(rounds: &[Round], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(rounds.iter().map(|round| (round.id, round)))
}

/// Point-in-time projection handed to readers.
///
/// `now` is stamped when the snapshot is taken, not when the state was last updated; render
/// countdowns against it rather than against the reader's clock.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "nowMs", with = "chrono::serde::ts_milliseconds")]
    pub now: DateTime<Utc>,
    #[serde(flatten)]
    pub state: Arc<StateView>,
}

/// Shortens an address to `0x1234...abcd` for log messages.
#[must_use]
pub fn mask_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
