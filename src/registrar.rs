//! Dynamic monitoring of newly deployed pairs.
//!
//! Every committed `PairCreated` event yields a pair contract whose own
//! events (Sync, Swap, Mint, Burn) must be indexed from then on. The
//! pair-creation handler only *requests* that; the registrar records the
//! request so the surrounding runtime can extend its log filters.
//!
//! Registration is fire-and-forget: implementations log their failures and
//! never report them back to the handler.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::repository::Repository;

/// Receiver of dynamic monitoring requests.
#[async_trait]
pub trait PairRegistrar: Send + Sync {
    /// Start tracking events emitted by `pair`, created in `block_number`.
    async fn register_pair_address(&self, pair: Address, block_number: u64);
}

/// Registrar persisting requests to the `tracked_pairs` table.
#[derive(Debug, Clone)]
pub struct StoredPairRegistrar {
    repository: Repository,
}

impl StoredPairRegistrar {
    /// Registrar writing through `repository`.
    #[must_use]
    pub const fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Addresses registered so far, in registration-block order.
    ///
    /// # Errors
    ///
    /// Returns an error if the `tracked_pairs` query fails.
    pub async fn tracked_addresses(&self) -> crate::error::IndexerResult<Vec<Address>> {
        let records = self.repository.get_tracked_pairs().await?;
        Ok(records
            .iter()
            .filter_map(|record| record.address.parse().ok())
            .collect())
    }
}

#[async_trait]
impl PairRegistrar for StoredPairRegistrar {
    async fn register_pair_address(&self, pair: Address, block_number: u64) {
        match self.repository.insert_tracked_pair(pair, block_number).await {
            Ok(()) => info!(%pair, block_number, "Registered pair for monitoring"),
            Err(e) => warn!(%pair, block_number, error = %e, "Failed to register pair for monitoring"),
        }
    }
}

/// Registrar keeping requests in memory.
#[derive(Debug, Default)]
pub struct MemoryPairRegistrar {
    pairs: Mutex<BTreeSet<Address>>,
}

impl MemoryPairRegistrar {
    /// Empty registrar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered addresses in ascending order.
    pub async fn registered(&self) -> Vec<Address> {
        self.pairs.lock().await.iter().copied().collect()
    }
}

#[async_trait]
impl PairRegistrar for MemoryPairRegistrar {
    async fn register_pair_address(&self, pair: Address, _block_number: u64) {
        self.pairs.lock().await.insert(pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use alloy::primitives::address;

    #[tokio::test]
    async fn test_stored_registrar_persists() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let registrar = StoredPairRegistrar::new(Repository::new(pool));
        let pair = address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc");

        registrar.register_pair_address(pair, 10_008_355).await;
        registrar.register_pair_address(pair, 10_008_355).await;

        assert_eq!(registrar.tracked_addresses().await.unwrap(), vec![pair]);
    }

    #[tokio::test]
    async fn test_memory_registrar() {
        let registrar = MemoryPairRegistrar::new();
        let a = address!("0000000000000000000000000000000000000002");
        let b = address!("0000000000000000000000000000000000000001");

        registrar.register_pair_address(a, 1).await;
        registrar.register_pair_address(b, 2).await;

        assert_eq!(registrar.registered().await, vec![b, a]);
    }
}
