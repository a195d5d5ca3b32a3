//! Process configuration, read from command-line flags or the environment.

use std::{net::SocketAddr, time::Duration};

use alloy::primitives::Address;
use clap::Parser;

use crate::{
    RoundsError,
    metric::{ClankerClient, DEFAULT_CLANKER_BASE_URL, DEFAULT_METRIC_TIMEOUT},
    orchestrator::RoundKeeperBuilder,
    range_scanner::DEFAULT_MAX_BLOCK_RANGE,
    robust_provider::{RobustProvider, RobustProviderBuilder},
};

/// Raw configuration as given by the operator; see [`Config::validate`].
#[derive(Parser, Debug, Clone)]
#[clap(
    rename_all = "kebab-case",
    author,
    version,
    about = "Last-buyer rounds over a liquidity pool"
)]
pub struct Config {
    /// Address of the watched pool (`0x` followed by 40 hex characters).
    #[clap(env, long)]
    pub pool_address: Option<String>,
    /// Primary JSON-RPC endpoint.
    #[clap(env, long)]
    pub base_rpc_url: Option<String>,
    /// Comma-separated fallback JSON-RPC endpoints, tried in order.
    #[clap(env, long, value_delimiter = ',')]
    pub base_rpc_fallback_urls: Vec<String>,
    #[clap(env, long)]
    pub clanker_api_key: Option<String>,
    #[clap(env, long, default_value = DEFAULT_CLANKER_BASE_URL)]
    pub clanker_base_url: String,
    #[clap(env, long, default_value = "0.0.0.0:3000")]
    pub listen_address: SocketAddr,
    /// Maximum number of blocks per `eth_getLogs` request.
    #[clap(env, long, default_value_t = DEFAULT_MAX_BLOCK_RANGE)]
    pub max_block_range: u64,
    /// Period of the cursor-advancing tick.
    #[clap(env, long, default_value_t = 5)]
    pub advance_interval_secs: u64,
    /// Period of the full reconciliation tick, metric refresh included.
    #[clap(env, long, default_value_t = 15)]
    pub reconcile_interval_secs: u64,
    /// Total timeout of one RPC call, retries included.
    #[clap(env, long, default_value_t = 30)]
    pub call_timeout_secs: u64,
    /// Retries per RPC endpoint before failing over.
    #[clap(env, long, default_value_t = 1)]
    pub max_retries: usize,
    /// Base delay of the exponential backoff between RPC retries.
    #[clap(env, long, default_value_t = 250)]
    pub retry_min_delay_ms: u64,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pool_address: Address,
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
    pub clanker_api_key: Option<String>,
    pub clanker_base_url: String,
    pub listen_address: SocketAddr,
    pub max_block_range: u64,
    pub advance_interval: Duration,
    pub reconcile_interval: Duration,
    pub call_timeout: Duration,
    pub max_retries: usize,
    pub retry_min_delay: Duration,
}

impl Config {
    /// # Errors
    ///
    /// Returns a configuration error for a missing or malformed pool address or RPC endpoint, a
    /// zero block range, or a zero tick interval.
    pub fn validate(self) -> Result<Settings, RoundsError> {
        let pool_address = parse_pool_address(self.pool_address.as_deref())?;

        let rpc_url = self
            .base_rpc_url
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RoundsError::InvalidRpcUrl(String::new()))?;
        let fallback_rpc_urls = self
            .base_rpc_fallback_urls
            .into_iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();

        if self.max_block_range == 0 {
            return Err(RoundsError::InvalidMaxBlockRange);
        }
        if self.advance_interval_secs == 0 {
            return Err(RoundsError::InvalidInterval("Advance"));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(RoundsError::InvalidInterval("Reconcile"));
        }

        Ok(Settings {
            pool_address,
            rpc_url,
            fallback_rpc_urls,
            clanker_api_key: self.clanker_api_key.filter(|key| !key.trim().is_empty()),
            clanker_base_url: self.clanker_base_url,
            listen_address: self.listen_address,
            max_block_range: self.max_block_range,
            advance_interval: Duration::from_secs(self.advance_interval_secs),
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            max_retries: self.max_retries,
            retry_min_delay: Duration::from_millis(self.retry_min_delay_ms),
        })
    }
}

impl Settings {
    /// # Errors
    ///
    /// Returns [`RoundsError::InvalidRpcUrl`] if an endpoint does not parse.
    pub fn robust_provider(&self) -> Result<RobustProvider, RoundsError> {
        self.fallback_rpc_urls
            .iter()
            .fold(RobustProviderBuilder::new(&self.rpc_url), |builder, url| builder.fallback(url))
            .call_timeout(self.call_timeout)
            .max_retries(self.max_retries)
            .min_delay(self.retry_min_delay)
            .build()
    }

    /// # Errors
    ///
    /// Returns [`RoundsError::MetricSource`] if the HTTP client cannot be initialised.
    pub fn metric_client(&self) -> Result<ClankerClient, RoundsError> {
        ClankerClient::new(
            &self.clanker_base_url,
            self.clanker_api_key.clone(),
            DEFAULT_METRIC_TIMEOUT.min(self.call_timeout),
        )
    }

    #[must_use]
    pub fn keeper_builder(&self) -> RoundKeeperBuilder {
        RoundKeeperBuilder::new(self.pool_address).max_block_range(self.max_block_range)
    }
}

fn parse_pool_address(raw: Option<&str>) -> Result<Address, RoundsError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let well_formed = raw.len() == 42
        && raw.starts_with("0x")
        && raw[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !well_formed {
        return Err(RoundsError::InvalidPoolAddress(raw.to_owned()));
    }
    raw.parse().map_err(|_| RoundsError::InvalidPoolAddress(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    fn config(args: &[&str]) -> Config {
        let argv = std::iter::once("pool-rounds").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    fn minimal() -> Config {
        config(&["--pool-address", POOL, "--base-rpc-url", "http://localhost:8545"])
    }

    #[test]
    fn defaults_apply() -> anyhow::Result<()> {
        let settings = minimal().validate()?;

        assert_eq!(settings.pool_address, POOL.parse::<Address>()?);
        assert_eq!(settings.max_block_range, 1200);
        assert_eq!(settings.advance_interval, Duration::from_secs(5));
        assert_eq!(settings.reconcile_interval, Duration::from_secs(15));
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.retry_min_delay, Duration::from_millis(250));
        assert_eq!(settings.listen_address, "0.0.0.0:3000".parse()?);
        assert_eq!(settings.clanker_base_url, DEFAULT_CLANKER_BASE_URL);
        Ok(())
    }

    #[test]
    fn fallbacks_are_comma_separated() -> anyhow::Result<()> {
        let settings = config(&[
            "--pool-address",
            POOL,
            "--base-rpc-url",
            "http://a:8545",
            "--base-rpc-fallback-urls",
            "http://b:8545, http://c:8545,",
        ])
        .validate()?;

        assert_eq!(settings.fallback_rpc_urls, vec!["http://b:8545", "http://c:8545"]);
        assert_eq!(settings.robust_provider()?.fallback_count(), 2);
        Ok(())
    }

    #[test]
    fn retry_policy_reaches_the_provider() -> anyhow::Result<()> {
        let mut config = minimal();
        config.call_timeout_secs = 12;
        config.max_retries = 4;
        config.retry_min_delay_ms = 40;

        let provider = config.validate()?.robust_provider()?;

        assert_eq!(provider.call_timeout(), Duration::from_secs(12));
        assert_eq!(provider.max_retries(), 4);
        assert_eq!(provider.min_delay(), Duration::from_millis(40));
        Ok(())
    }

    #[test]
    fn pool_address_must_be_well_formed() {
        let mut config = minimal();
        let non_hex = POOL.replace('d', "g");
        for bad in ["", "0x1234", "d8dA6BF26964aF9D7eEd9e03E53415D37aA96045aa", &non_hex] {
            config.pool_address = Some(bad.to_owned());
            assert!(matches!(
                config.clone().validate(),
                Err(RoundsError::InvalidPoolAddress(_))
            ));
        }

        config.pool_address = None;
        assert!(matches!(config.validate(), Err(RoundsError::InvalidPoolAddress(_))));
    }

    #[test]
    fn rpc_url_is_required() {
        let mut config = minimal();
        config.base_rpc_url = Some("  ".into());

        let result = config.validate();

        assert!(result.is_err_and(|e| e.kind() == crate::ErrorKind::Configuration));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = minimal();
        config.max_block_range = 0;
        assert!(matches!(config.clone().validate(), Err(RoundsError::InvalidMaxBlockRange)));

        let mut config = minimal();
        config.advance_interval_secs = 0;
        assert!(matches!(config.validate(), Err(RoundsError::InvalidInterval("Advance"))));
    }

    #[test]
    fn blank_api_key_counts_as_absent() -> anyhow::Result<()> {
        let mut config = minimal();
        config.clanker_api_key = Some(String::new());

        let settings = config.validate()?;

        assert!(settings.clanker_api_key.is_none());
        assert!(!settings.metric_client()?.has_api_key());
        Ok(())
    }
}
