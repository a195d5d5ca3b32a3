use std::{mem::discriminant, sync::Arc};

use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

use crate::robust_provider::provider::Error as RobustProviderError;

/// Errors emitted by the round keeper and its collaborators.
///
/// Every variant belongs to one [`ErrorKind`]. Configuration errors are fatal at start-up,
/// upstream errors abort only the round operation in progress (its cursor is left untouched so
/// the next tick retries), and validation errors are rejected before any state is touched.
#[derive(Error, Debug, Clone)]
pub enum RoundsError {
    /// The pool address is missing or is not a `0x`-prefixed 20-byte hex string.
    #[error("Invalid or missing pool address: {0:?}")]
    InvalidPoolAddress(String),

    /// The RPC endpoint is missing or cannot be parsed as a URL.
    #[error("Invalid or missing RPC url: {0:?}")]
    InvalidRpcUrl(String),

    /// The configured maximum block range is invalid (must be greater than zero).
    #[error("Max block range must be greater than 0")]
    InvalidMaxBlockRange,

    /// A history capacity is invalid (must be greater than zero).
    #[error("{0} capacity must be greater than 0")]
    InvalidCapacity(&'static str),

    /// A scheduling interval is invalid (must be greater than zero).
    #[error("{0} interval must be greater than 0")]
    InvalidInterval(&'static str),

    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// A timeout elapsed while waiting for an upstream response.
    #[error("Operation timed out")]
    Timeout,

    /// The event source returned a log that is missing a required field or does not decode.
    #[error("Malformed swap log: {0}")]
    MalformedLog(String),

    /// The metric source could not be reached or answered with an unreadable body.
    #[error("Metric source error: {0}")]
    MetricSource(String),

    /// A round identifier outside the closed set was supplied.
    #[error("Invalid round id: {0:?}")]
    InvalidRoundId(String),
}

/// Coarse classification of [`RoundsError`] values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Upstream,
    Validation,
}

impl RoundsError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoundsError::InvalidPoolAddress(_)
            | RoundsError::InvalidRpcUrl(_)
            | RoundsError::InvalidMaxBlockRange
            | RoundsError::InvalidCapacity(_)
            | RoundsError::InvalidInterval(_) => ErrorKind::Configuration,
            RoundsError::RpcError(_)
            | RoundsError::Timeout
            | RoundsError::MalformedLog(_)
            | RoundsError::MetricSource(_) => ErrorKind::Upstream,
            RoundsError::InvalidRoundId(_) => ErrorKind::Validation,
        }
    }

    #[must_use]
    pub fn is_upstream(&self) -> bool {
        self.kind() == ErrorKind::Upstream
    }
}

impl From<RobustProviderError> for RoundsError {
    fn from(error: RobustProviderError) -> RoundsError {
        match error {
            RobustProviderError::Timeout => RoundsError::Timeout,
            RobustProviderError::RpcError(err) => RoundsError::RpcError(err),
        }
    }
}

impl From<RpcError<TransportErrorKind>> for RoundsError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        RoundsError::RpcError(Arc::new(error))
    }
}

impl<T> PartialEq<RoundsError> for Result<T, RoundsError> {
    fn eq(&self, other: &RoundsError) -> bool {
        match self {
            Ok(_) => false,
            Err(err) => discriminant(err) == discriminant(other),
        }
    }
}
