//! RPC provider management for Ethereum connections.
//!
//! Thin wrappers over Alloy's HTTP provider that attach logging and map
//! transport failures into [`IndexerError::RpcError`].
//!
//! ## Example
//!
//! ```no_run
//! use uniswap_factory_sync::rpc::{create_provider, get_latest_block};
//! use uniswap_factory_sync::error::IndexerResult;
//!
//! # async fn example() -> IndexerResult<()> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY").await?;
//! let latest_block = get_latest_block(&provider).await?;
//! println!("Latest block: {}", latest_block);
//! # Ok(())
//! # }
//! ```

use crate::error::{IndexerError, IndexerResult};
use alloy::primitives::{Address, BlockNumber};
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Log};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, instrument};

use crate::events::create_pair_created_filter;

/// Type alias for the HTTP provider.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new Ethereum RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> IndexerResult<Provider> {
    // Host only, never the API key
    let host = rpc_url.split("/v2/").next().unwrap_or("unknown");
    tracing::Span::current().record("rpc_host", host);
    debug!(rpc_host = host, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        IndexerError::rpc(
            format!("Invalid RPC URL for host '{host}'. Expected an http(s) endpoint"),
            Some(Box::new(e)),
        )
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized");

    Ok(provider)
}

/// Get the latest block number.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
#[instrument(skip(provider), fields(duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> IndexerResult<u64> {
    let start = std::time::Instant::now();
    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| IndexerError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::Span::current().record("duration_ms", duration_ms);
    debug!(block = block_number, "Latest block fetched");

    Ok(block_number)
}

/// Fetch `PairCreated` logs emitted by `factory` in `[from_block, to_block]`.
///
/// # Errors
///
/// Returns an error if the `eth_getLogs` request fails.
#[instrument(skip(provider))]
pub async fn fetch_pair_created_logs(
    provider: &Provider,
    factory: Address,
    from_block: u64,
    to_block: u64,
) -> IndexerResult<Vec<Log>> {
    let filter = create_pair_created_filter(factory, from_block, to_block);

    let logs = provider.get_logs(&filter).await.map_err(|e| {
        IndexerError::rpc(
            format!("Failed to fetch PairCreated logs for blocks {from_block}..={to_block}"),
            Some(Box::new(e)),
        )
    })?;

    debug!(count = logs.len(), "Fetched PairCreated logs");

    Ok(logs)
}

/// Timestamp of block `number`, read from its header.
///
/// # Errors
///
/// Returns an error if the request fails or the node does not know the block.
#[instrument(skip(provider), level = "debug")]
pub async fn get_block_timestamp(provider: &Provider, number: BlockNumber) -> IndexerResult<u64> {
    let block = provider
        .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
        .await
        .map_err(|e| {
            IndexerError::rpc(format!("Failed to fetch block {number}"), Some(Box::new(e)))
        })?
        .ok_or_else(|| IndexerError::rpc(format!("Block {number} not found"), None))?;

    Ok(block.header.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_url() -> String {
        std::env::var("RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_string())
    }

    #[tokio::test]
    #[ignore = "Requires valid RPC_URL environment variable"]
    async fn test_get_latest_block_integration() {
        let provider = create_provider(&rpc_url()).await.unwrap();
        let block = get_latest_block(&provider).await.unwrap();
        assert!(block > 0);
    }

    #[tokio::test]
    #[ignore = "Requires valid RPC_URL environment variable"]
    async fn test_first_uniswap_pairs_integration() {
        use crate::events::{UNISWAP_V2_FACTORY, UNISWAP_V2_FACTORY_START_BLOCK};

        let provider = create_provider(&rpc_url()).await.unwrap();
        let logs = fetch_pair_created_logs(
            &provider,
            UNISWAP_V2_FACTORY,
            UNISWAP_V2_FACTORY_START_BLOCK,
            UNISWAP_V2_FACTORY_START_BLOCK + 10_000,
        )
        .await
        .unwrap();
        assert!(!logs.is_empty());
    }

    #[tokio::test]
    async fn test_create_provider_invalid_url() {
        let result = create_provider("not-a-valid-url").await;
        assert!(matches!(result, Err(IndexerError::RpcError { .. })));
    }
}
