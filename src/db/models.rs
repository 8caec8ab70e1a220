//! Database models that map to SQL tables.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::entities::entity_id;

/// Row of the `entities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityRow {
    /// Entity kind name (`Factory`, `Token`, ...)
    pub kind: String,
    /// Entity key
    pub id: String,
    /// JSON document
    pub data: String,
    /// Unix timestamp of the last save
    pub updated_at: i64,
}

/// A pair address registered for dynamic monitoring.
///
/// Maps to the `tracked_pairs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackedPairRecord {
    /// Pair contract address (lower-case hex with 0x prefix)
    pub address: String,
    /// Block in which the pair was created
    pub registered_at_block: i64,
    /// Unix timestamp when the registration was stored
    pub created_at: i64,
}

impl TrackedPairRecord {
    /// Creates a new registration record for a pair discovered at `block_number`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(address: Address, block_number: u64) -> Self {
        Self {
            address: entity_id(&address),
            registered_at_block: block_number as i64,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Indexer cursor for one factory.
///
/// Maps to the `indexer_state` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexerState {
    /// Factory contract address (lower-case hex with 0x prefix)
    pub factory_address: String,
    /// Last block whose events were fully processed
    pub last_indexed_block: i64,
    /// Hash of that block, when known
    pub last_block_hash: Option<String>,
    /// PairCreated events handed to the handler so far
    pub total_events_processed: i64,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

impl IndexerState {
    /// Last indexed block as an unsigned block number.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn last_block(&self) -> u64 {
        if self.last_indexed_block < 0 {
            0
        } else {
            self.last_indexed_block as u64
        }
    }

    /// Parsed `last_block_hash`, if present and well-formed.
    #[must_use]
    pub fn block_hash(&self) -> Option<B256> {
        self.last_block_hash.as_deref().and_then(|h| h.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    #[test]
    fn test_tracked_pair_record_lowercases_address() {
        let record = TrackedPairRecord::new(
            address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc"),
            10_008_355,
        );
        assert_eq!(record.address, "0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc");
        assert_eq!(record.registered_at_block, 10_008_355);
        assert!(record.created_at > 0);
    }

    #[test]
    fn test_indexer_state_accessors() {
        let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        let state = IndexerState {
            factory_address: "0xf".to_string(),
            last_indexed_block: 19_000_000,
            last_block_hash: Some(format!("{hash:?}")),
            total_events_processed: 3,
            updated_at: 0,
        };

        assert_eq!(state.last_block(), 19_000_000);
        assert_eq!(state.block_hash(), Some(hash));
    }
}
