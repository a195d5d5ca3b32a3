//! Timeout, retry and failover wrapper around Alloy HTTP providers.
//!
//! [`RobustProvider`] wraps a primary [`RootProvider`](alloy::providers::RootProvider) and any
//! number of fallbacks. Every call made through it is:
//! * bounded by a total per-call timeout
//! * retried with exponential backoff up to `max_retries` on the same endpoint
//! * retried on each fallback endpoint, in the order they were added, if the primary gives up
//!
//! The last error is surfaced to the caller once every endpoint has failed.
//!
//! ```rust,no_run
//! use pool_rounds::robust_provider::RobustProviderBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let robust = RobustProviderBuilder::new("https://mainnet.base.org")
//!     .fallback("https://base.llamarpc.com")
//!     .call_timeout(Duration::from_secs(20))
//!     .max_retries(1)
//!     .build()?;
//!
//! let head = robust.get_block_number().await?;
//! println!("Current block: {head}");
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;

pub use builder::*;
pub use provider::{Error, RobustProvider};
