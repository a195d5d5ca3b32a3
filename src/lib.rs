//! Pool-Rounds runs timed "last buyer wins" rounds over the swaps of a single liquidity pool.
//!
//! The main entry point is [`RoundKeeper`], built via [`RoundKeeperBuilder`]. On connect it
//! classifies the pool as [`PoolVariant::V2`] or [`PoolVariant::V3`] and opens one [`Round`] per
//! [`RoundId`] at the current chain height.
//!
//! # Passes
//!
//! [`RoundKeeper::reconcile`] fetches the chain height once, refreshes the payout metric, and then
//! for every round either closes and replaces it (if its time is up) or folds in the swaps since
//! its cursor. A round whose scan fails keeps its cursor and is retried on the next pass; the
//! other rounds are not affected.
//!
//! # Winners
//!
//! The winner of a round is the buyer of its last swap in `(block_number, log_index)` order. The
//! closing scan always covers the whole round, so the decision does not depend on how often the
//! round was advanced.
//!
//! # Reading state
//!
//! [`RoundKeeper::snapshot`] never waits for a pass in flight: it returns the state published by
//! the last completed trigger.
//!
//! # Robust providers
//!
//! The [`robust_provider`] module provides [`robust_provider::RobustProvider`], a wrapper that can
//! retry and fail over across multiple RPC endpoints.

#[macro_use]
mod logging;

pub mod api;
pub mod chain;
pub mod config;
pub mod history;
pub mod metric;
pub mod orchestrator;
pub mod range_scanner;
pub mod robust_provider;
pub mod round;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

mod error;
mod source;

pub use error::{ErrorKind, RoundsError};
pub use source::{EventSource, MetricSource, VariantClassifier};

pub use history::{HistoryCapacity, HistoryStore};
pub use orchestrator::{PassReport, RoundKeeper, RoundKeeperBuilder};
pub use range_scanner::{DEFAULT_MAX_BLOCK_RANGE, RangeScanner};
pub use round::{Round, RoundStatus};
pub use types::{
    LogEntry, LogKind, PoolContext, PoolVariant, RoundId, Snapshot, StateView, SwapEvent, SwapLog,
    WinnerRecord,
};
