//! Uniswap V2 factory `PairCreated` events.
//!
//! The factory interface is declared with Alloy's `sol!` macro, so the event
//! signature hash and topic/data decoding are generated at compile time.
//! Decoded logs are flattened into [`PairCreatedEvent`], the record the
//! pair-creation handler consumes: the three addresses from the event plus
//! the block and transaction metadata needed for diagnostics.
//!
//! ## Example
//!
//! ```no_run
//! use uniswap_factory_sync::events::{create_pair_created_filter, UNISWAP_V2_FACTORY};
//! use uniswap_factory_sync::rpc::create_provider;
//! use alloy::providers::Provider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY").await?;
//! let filter = create_pair_created_filter(UNISWAP_V2_FACTORY, 10_000_834, 10_010_000);
//! let logs = provider.get_logs(&filter).await?;
//! println!("Found {} PairCreated events", logs.len());
//! # Ok(())
//! # }
//! ```

use alloy::primitives::{address, Address, Log as PrimitiveLog, B256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::error::{IndexerError, IndexerResult};

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        /// Emitted once per deployed pair; `token0 < token1` by address.
        event PairCreated(address indexed token0, address indexed token1, address pair, uint256 allPairsLength);
    }
}

pub use IUniswapV2Factory::PairCreated;

/// Uniswap V2 factory on Ethereum mainnet.
pub const UNISWAP_V2_FACTORY: Address = address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");

/// Block in which [`UNISWAP_V2_FACTORY`] was deployed.
pub const UNISWAP_V2_FACTORY_START_BLOCK: u64 = 10_000_834;

/// A decoded pair-creation event with its chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCreatedEvent {
    /// First token of the pair.
    pub token0: Address,
    /// Second token of the pair.
    pub token1: Address,
    /// Newly deployed pair contract.
    pub pair: Address,
    /// Block number of the emitting transaction.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
    /// Block timestamp (Unix seconds).
    pub block_timestamp: u64,
    /// Emitting transaction.
    pub transaction_hash: B256,
    /// Log index within the block.
    pub log_index: u64,
}

impl PairCreatedEvent {
    /// Canonical processing order: block number, then log index.
    #[must_use]
    pub const fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Create a filter for `PairCreated` events emitted by `factory`.
///
/// Both block bounds are inclusive.
#[must_use]
pub fn create_pair_created_filter(factory: Address, from_block: u64, to_block: u64) -> Filter {
    Filter::new()
        .address(factory)
        .event_signature(PairCreated::SIGNATURE_HASH)
        .from_block(from_block)
        .to_block(to_block)
}

/// Decode an RPC log into a [`PairCreatedEvent`].
///
/// `block_timestamp` is taken from the log when the node supplies it;
/// otherwise `fallback_timestamp` is used (the caller looks it up from the
/// block header).
///
/// # Errors
///
/// Returns [`IndexerError::DecodingError`] if the log is not a `PairCreated`
/// event or lacks block/transaction metadata (pending logs).
pub fn decode_pair_created(log: &Log, fallback_timestamp: Option<u64>) -> IndexerResult<PairCreatedEvent> {
    let block_number = log
        .block_number
        .ok_or_else(|| IndexerError::decoding("Log missing block number", None))?;
    let block_hash = log
        .block_hash
        .ok_or_else(|| IndexerError::decoding("Log missing block hash", None))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or_else(|| IndexerError::decoding("Log missing transaction hash", None))?;
    let log_index = log
        .log_index
        .ok_or_else(|| IndexerError::decoding("Log missing log index", None))?;
    let block_timestamp = log
        .block_timestamp
        .or(fallback_timestamp)
        .ok_or_else(|| {
            IndexerError::decoding(format!("No timestamp for block {block_number}"), None)
        })?;

    // Convert RPC Log to Primitive Log for decoding
    let primitive_log = PrimitiveLog {
        address: log.address(),
        data: log.data().clone(),
    };

    let decoded = PairCreated::decode_log(&primitive_log, true).map_err(|e| {
        IndexerError::decoding(
            format!("Failed to decode PairCreated event: {e}"),
            Some(Box::new(e)),
        )
    })?;

    Ok(PairCreatedEvent {
        token0: decoded.data.token0,
        token1: decoded.data.token1,
        pair: decoded.data.pair,
        block_number,
        block_hash,
        block_timestamp,
        transaction_hash,
        log_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{b256, LogData, U256};

    fn pair_created_log(with_timestamp: bool) -> Log {
        let event = PairCreated {
            token0: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            token1: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            pair: address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc"),
            allPairsLength: U256::from(1u64),
        };
        let data: LogData = event.encode_log_data();

        Log {
            inner: PrimitiveLog {
                address: UNISWAP_V2_FACTORY,
                data,
            },
            block_hash: Some(b256!(
                "1111111111111111111111111111111111111111111111111111111111111111"
            )),
            block_number: Some(10_008_355),
            block_timestamp: with_timestamp.then_some(1_588_710_145),
            transaction_hash: Some(b256!(
                "2222222222222222222222222222222222222222222222222222222222222222"
            )),
            transaction_index: Some(3),
            log_index: Some(12),
            removed: false,
        }
    }

    #[test]
    fn test_pair_created_signature() {
        // keccak256("PairCreated(address,address,address,uint256)")
        assert_eq!(
            PairCreated::SIGNATURE_HASH,
            b256!("0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cddefde31afa28d0e9")
        );
    }

    #[test]
    fn test_decode_pair_created() {
        let event = decode_pair_created(&pair_created_log(true), None).unwrap();

        assert_eq!(event.token0, address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
        assert_eq!(event.token1, address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
        assert_eq!(event.pair, address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc"));
        assert_eq!(event.block_number, 10_008_355);
        assert_eq!(event.block_timestamp, 1_588_710_145);
        assert_eq!(event.ordering_key(), (10_008_355, 12));
    }

    #[test]
    fn test_decode_uses_fallback_timestamp() {
        let event = decode_pair_created(&pair_created_log(false), Some(42)).unwrap();
        assert_eq!(event.block_timestamp, 42);
    }

    #[test]
    fn test_decode_without_any_timestamp_fails() {
        let result = decode_pair_created(&pair_created_log(false), None);
        assert!(matches!(result, Err(IndexerError::DecodingError { .. })));
    }

    #[test]
    fn test_decode_pending_log_fails() {
        let mut log = pair_created_log(true);
        log.block_hash = None;
        assert!(decode_pair_created(&log, None).is_err());
    }

    #[test]
    fn test_filter_creation() {
        let filter = create_pair_created_filter(UNISWAP_V2_FACTORY, 10_000_834, 10_001_833);

        assert!(filter.address.matches(&UNISWAP_V2_FACTORY));
        assert!(!filter.address.matches(&Address::ZERO));
        assert!(filter.topics[0].matches(&PairCreated::SIGNATURE_HASH));
        assert!(!filter.topics[0].matches(&B256::ZERO));
        assert_eq!(filter.get_from_block(), Some(10_000_834));
        assert_eq!(filter.get_to_block(), Some(10_001_833));
    }
}
