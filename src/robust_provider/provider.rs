use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::Bytes,
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log, TransactionRequest},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio::time::{error::Elapsed, timeout};

/// Errors returned by [`RobustProvider`] once every endpoint has been tried.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Operation timed out")]
    Timeout,
    #[error("RPC call failed after exhausting all retry attempts: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Error::RpcError(Arc::new(err))
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout
    }
}

impl Error {
    /// Whether the endpoint answered with a JSON-RPC error object (e.g. an execution revert),
    /// as opposed to a transport failure or a timeout.
    #[must_use]
    pub fn is_error_response(&self) -> bool {
        matches!(self, Error::RpcError(err) if matches!(err.as_ref(), RpcError::ErrorResp(_)))
    }
}

/// Provider wrapper with built-in retry, timeout and failover.
#[derive(Clone, Debug)]
pub struct RobustProvider {
    primary_provider: RootProvider,
    fallback_providers: Vec<RootProvider>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl RobustProvider {
    pub(crate) fn from_parts(
        primary_provider: RootProvider,
        fallback_providers: Vec<RootProvider>,
        call_timeout: Duration,
        max_retries: usize,
        min_delay: Duration,
    ) -> Self {
        Self { primary_provider, fallback_providers, call_timeout, max_retries, min_delay }
    }

    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallback_providers.len()
    }

    #[must_use]
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Fetch the latest block number.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_block_number(&self) -> Result<u64, Error> {
        trace!("eth_blockNumber called");
        let result = self
            .try_operation_with_failover(|provider| async move {
                provider.get_block_number().await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetch logs for the given [`Filter`].
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, Error> {
        trace!("eth_getLogs called");
        let result = self
            .try_operation_with_failover(
                move |provider| async move { provider.get_logs(filter).await },
            )
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getLogs failed");
        }
        result
    }

    /// Execute a read-only `eth_call` against the latest block.
    ///
    /// A revert comes back as an [`Error::RpcError`] for which
    /// [`Error::is_error_response`] is true.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, Error> {
        trace!("eth_call called");
        let result = self
            .try_operation_with_failover(|provider| {
                let tx = tx.clone();
                async move { provider.call(tx).await }
            })
            .await;
        if let Err(e) = &result {
            debug!(error = %e, "eth_call failed");
        }
        result
    }

    /// Execute `operation` against the primary provider and then, in order, each fallback.
    ///
    /// # Errors
    /// <a name="retry-errors"></a>
    ///
    /// * [`Error::Timeout`] if the last endpoint tried exceeded `call_timeout`.
    /// * [`Error::RpcError`] carrying the last endpoint's error otherwise.
    pub(crate) async fn try_operation_with_failover<T, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let primary = &self.primary_provider;
        let mut last_error = match self.try_provider_with_timeout(primary, &operation).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        // A JSON-RPC error object is an answer, not an outage; another node would say the same.
        if last_error.is_error_response() {
            return Err(last_error);
        }

        let num_fallbacks = self.fallback_providers.len();
        if num_fallbacks > 0 {
            info!(error = %last_error, "Primary provider failed, trying fallback provider(s)");
        }

        for (fallback_idx, provider) in self.fallback_providers.iter().enumerate() {
            match self.try_provider_with_timeout(provider, &operation).await {
                Ok(value) => {
                    info!(provider_num = fallback_idx + 1, "Fallback provider succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(provider_num = fallback_idx + 1, error = %e, "Fallback provider failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Try executing an operation with a specific provider with retry and timeout.
    async fn try_provider_with_timeout<T, F, Fut>(
        &self,
        provider: &RootProvider,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(provider.clone()))
                .retry(retry_strategy)
                .when(|err: &RpcError<TransportErrorKind>| !matches!(err, RpcError::ErrorResp(_)))
                .notify(|err: &RpcError<TransportErrorKind>, dur: Duration| {
                    debug!(error = %err, delay_ms = dur.as_millis(), "RPC error, retrying");
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(Error::from)?
        .map_err(Error::from)
    }
}
