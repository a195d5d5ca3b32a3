//! Payout estimate from the Clanker rewards API.

use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;
use serde_json::Value;

use crate::{MetricSource, RoundsError};

pub const DEFAULT_CLANKER_BASE_URL: &str = "https://www.clanker.world";
pub const DEFAULT_METRIC_TIMEOUT: Duration = Duration::from_secs(10);

const ESTIMATE_PATH: &str = "/api/tokens/estimate-rewards-by-pool-address";

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    #[serde(rename = "userRewards")]
    user_rewards: Option<Value>,
}

/// [`MetricSource`] querying the estimated rewards of a pool.
///
/// Without an API key no request is made and every estimate is absent.
#[derive(Clone, Debug)]
pub struct ClankerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ClankerClient {
    /// # Errors
    ///
    /// Returns [`RoundsError::MetricSource`] if the HTTP client cannot be initialised.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RoundsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoundsError::MetricSource(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url, api_key: api_key.filter(|key| !key.is_empty()) })
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl MetricSource for ClankerClient {
    async fn estimate_usd(&self, pool: Address) -> Result<Option<f64>, RoundsError> {
        let Some(api_key) = &self.api_key else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}{ESTIMATE_PATH}", self.base_url))
            .query(&[("poolAddress", pool.to_string())])
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(|e| RoundsError::MetricSource(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "Rewards estimate unavailable");
            return Ok(None);
        }

        let body: EstimateResponse =
            response.json().await.map_err(|e| RoundsError::MetricSource(e.to_string()))?;

        Ok(body.user_rewards.as_ref().and_then(Value::as_f64))
    }
}
