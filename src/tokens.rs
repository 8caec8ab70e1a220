//! Get-or-create of [`Token`] records.

use alloy::primitives::Address;
use tracing::{debug, info, instrument};

use crate::entities::{entity_id, Token};
use crate::error::IndexerResult;
use crate::metadata::MetadataResolver;
use crate::store::{EntityStore, EntityStoreExt};

/// Load the Token for `address`, or build it from freshly resolved metadata.
///
/// Metadata is resolved only when the token is new, one resolver call per
/// field. An existing Token is returned untouched. Nothing is saved here;
/// the caller decides whether the token is committed.
///
/// Absent metadata does not fail the upsert: the Token comes back with
/// `decimals: None` and the caller validates it.
///
/// # Errors
///
/// Propagates store failures and undecodable Token documents.
#[instrument(skip(store, resolver), level = "debug")]
pub async fn get_or_create_token<S, M>(
    store: &S,
    resolver: &M,
    address: Address,
) -> IndexerResult<Token>
where
    S: EntityStore + ?Sized,
    M: MetadataResolver + ?Sized,
{
    let id = entity_id(&address);

    if let Some(token) = store.load::<Token>(&id).await? {
        debug!(token = %id, "Token already indexed");
        return Ok(token);
    }

    let symbol = resolver.fetch_symbol(address).await;
    let name = resolver.fetch_name(address).await;
    let total_supply = resolver.fetch_total_supply(address).await;
    let decimals = resolver.fetch_decimals(address).await;

    info!(token = %id, %symbol, ?decimals, "Resolved new token");

    Ok(Token::new(id, symbol, name, decimals, total_supply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;
    use crate::store::MemoryEntityStore;
    use alloy::primitives::{address, U256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    #[derive(Default)]
    struct CountingResolver {
        symbol: AtomicUsize,
        name: AtomicUsize,
        decimals: AtomicUsize,
        total_supply: AtomicUsize,
    }

    impl CountingResolver {
        fn counts(&self) -> [usize; 4] {
            [
                self.symbol.load(Ordering::SeqCst),
                self.name.load(Ordering::SeqCst),
                self.decimals.load(Ordering::SeqCst),
                self.total_supply.load(Ordering::SeqCst),
            ]
        }
    }

    #[async_trait]
    impl MetadataResolver for CountingResolver {
        async fn fetch_symbol(&self, _token: Address) -> String {
            self.symbol.fetch_add(1, Ordering::SeqCst);
            "WETH".to_string()
        }

        async fn fetch_name(&self, _token: Address) -> String {
            self.name.fetch_add(1, Ordering::SeqCst);
            "Wrapped Ether".to_string()
        }

        async fn fetch_decimals(&self, _token: Address) -> Option<u8> {
            self.decimals.fetch_add(1, Ordering::SeqCst);
            Some(18)
        }

        async fn fetch_total_supply(&self, _token: Address) -> U256 {
            self.total_supply.fetch_add(1, Ordering::SeqCst);
            U256::from(7_000_000u64)
        }
    }

    #[tokio::test]
    async fn test_new_token_resolves_each_field_once() {
        let store = MemoryEntityStore::new();
        let resolver = CountingResolver::default();

        let token = get_or_create_token(&store, &resolver, WETH).await.unwrap();

        assert_eq!(resolver.counts(), [1, 1, 1, 1]);
        assert_eq!(token.id, entity_id(&WETH));
        assert_eq!(token.symbol, "WETH");
        assert_eq!(token.name, "Wrapped Ether");
        assert_eq!(token.decimals, Some(18));
        assert_eq!(token.total_supply, U256::from(7_000_000u64));
    }

    #[tokio::test]
    async fn test_new_token_is_not_saved() {
        let store = MemoryEntityStore::new();
        let resolver = CountingResolver::default();

        get_or_create_token(&store, &resolver, WETH).await.unwrap();

        assert_eq!(store.count(EntityKind::Token).await, 0);
        assert!(store.save_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_stored_token_skips_resolver() {
        let store = MemoryEntityStore::new();
        let resolver = CountingResolver::default();
        let stored = Token::new(entity_id(&WETH), "OLD", "Stored name", Some(6), U256::from(1u64));
        store.save(&stored).await.unwrap();

        let token = get_or_create_token(&store, &resolver, WETH).await.unwrap();

        assert_eq!(token, stored);
        assert_eq!(resolver.counts(), [0, 0, 0, 0]);
        assert_eq!(store.save_log().await.len(), 1);
    }
}
