use std::time::Duration;

use alloy::{providers::RootProvider, transports::http::reqwest::Url};

use crate::{RoundsError, robust_provider::RobustProvider};

/// Default total timeout for a single RPC call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum number of retry attempts per endpoint.
pub const DEFAULT_MAX_RETRIES: usize = 1;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(250);

/// Builder for constructing a [`RobustProvider`] from RPC endpoint URLs.
#[derive(Clone, Debug)]
pub struct RobustProviderBuilder {
    primary_url: String,
    fallback_urls: Vec<String>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl RobustProviderBuilder {
    /// Create a builder with default settings; `url` becomes the primary endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            primary_url: url.into(),
            fallback_urls: vec![],
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }

    /// Add a fallback endpoint, used when the primary times out or fails.
    #[must_use]
    pub fn fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_urls.push(url.into());
        self
    }

    /// Set the total timeout for one RPC operation.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the maximum number of retry attempts per endpoint.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Build the `RobustProvider`.
    ///
    /// HTTP providers connect lazily, so this only validates the endpoint URLs.
    ///
    /// # Errors
    ///
    /// Returns [`RoundsError::InvalidRpcUrl`] if any endpoint is not a valid URL.
    pub fn build(self) -> Result<RobustProvider, RoundsError> {
        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            fallback_count = self.fallback_urls.len(),
            "Building RobustProvider"
        );

        let primary_provider = http_provider(&self.primary_url)?;
        let fallback_providers =
            self.fallback_urls.iter().map(|url| http_provider(url)).collect::<Result<_, _>>()?;

        info!("RobustProvider initialized");

        Ok(RobustProvider::from_parts(
            primary_provider,
            fallback_providers,
            self.call_timeout,
            self.max_retries,
            self.min_delay,
        ))
    }
}

fn http_provider(url: &str) -> Result<RootProvider, RoundsError> {
    let parsed =
        Url::parse(url.trim()).map_err(|_| RoundsError::InvalidRpcUrl(url.to_owned()))?;
    Ok(RootProvider::new_http(parsed))
}
