//! Alloy-backed [`EventSource`] and [`VariantClassifier`].

use std::ops::RangeInclusive;

use alloy::{
    primitives::{Address, Bytes},
    rpc::types::{Filter, Log, TransactionInput, TransactionRequest},
    sol,
    sol_types::{SolCall, SolEvent},
};

use crate::{
    EventSource, RoundsError, VariantClassifier,
    robust_provider::RobustProvider,
    types::{PoolContext, PoolVariant, SwapLog},
};

sol! {
    interface IUniswapV2Pair {
        event Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        );
    }

    interface IUniswapV3Pool {
        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );

        function fee() external view returns (uint24);
    }
}

/// Reads swaps and chain height through a [`RobustProvider`].
#[derive(Clone, Debug)]
pub struct ChainEventSource {
    provider: RobustProvider,
}

impl ChainEventSource {
    #[must_use]
    pub fn new(provider: RobustProvider) -> Self {
        Self { provider }
    }

    fn filter(pool: &PoolContext, range: &RangeInclusive<u64>) -> Filter {
        let signature = match pool.variant {
            PoolVariant::V2 => IUniswapV2Pair::Swap::SIGNATURE_HASH,
            PoolVariant::V3 => IUniswapV3Pool::Swap::SIGNATURE_HASH,
        };
        Filter::new()
            .address(pool.address)
            .event_signature(signature)
            .from_block(*range.start())
            .to_block(*range.end())
    }
}

impl EventSource for ChainEventSource {
    async fn current_height(&self) -> Result<u64, RoundsError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn swaps(
        &self,
        pool: &PoolContext,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<SwapLog>, RoundsError> {
        let filter = Self::filter(pool, &range);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter().map(|log| decode_swap(pool.variant, log)).collect()
    }
}

/// Validates a raw log and resolves its buyer: `to` for V2 pairs, `recipient` for V3 pools.
fn decode_swap(variant: PoolVariant, log: &Log) -> Result<SwapLog, RoundsError> {
    let (Some(tx_hash), Some(block_number), Some(log_index)) =
        (log.transaction_hash, log.block_number, log.log_index)
    else {
        return Err(RoundsError::MalformedLog(
            "log is missing transaction hash, block number or log index".into(),
        ));
    };

    let buyer = match variant {
        PoolVariant::V2 => log.log_decode::<IUniswapV2Pair::Swap>().map(|l| l.inner.data.to),
        PoolVariant::V3 => {
            log.log_decode::<IUniswapV3Pool::Swap>().map(|l| l.inner.data.recipient)
        }
    }
    .map_err(|e| RoundsError::MalformedLog(format!("tx {tx_hash}: {e}")))?;

    Ok(SwapLog { tx_hash, block_number, log_index, buyer })
}

/// Tells V2 pairs and V3 pools apart by calling `fee()`, which only V3 pools implement.
#[derive(Clone, Debug)]
pub struct ChainClassifier {
    provider: RobustProvider,
}

impl ChainClassifier {
    #[must_use]
    pub fn new(provider: RobustProvider) -> Self {
        Self { provider }
    }
}

impl VariantClassifier for ChainClassifier {
    async fn classify(&self, pool: Address) -> Result<PoolVariant, RoundsError> {
        let tx = TransactionRequest::default()
            .to(pool)
            .input(TransactionInput::new(Bytes::from(IUniswapV3Pool::feeCall {}.abi_encode())));

        match self.provider.call(&tx).await {
            // An account without code answers any call with empty output.
            Ok(output) if output.is_empty() => {
                debug!(pool = %pool, "fee() returned no data, treating pool as V2");
                Ok(PoolVariant::V2)
            }
            Ok(_) => Ok(PoolVariant::V3),
            Err(e) if e.is_error_response() => {
                debug!(pool = %pool, error = %e, "fee() reverted, treating pool as V2");
                Ok(PoolVariant::V2)
            }
            Err(e) => Err(e.into()),
        }
    }
}
