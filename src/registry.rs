//! Get-or-create of the process-wide singletons.
//!
//! The [`Factory`] record is keyed by the factory contract address and the
//! [`Bundle`] by [`BUNDLE_ID`]. Both are guarded by a lookup in the store,
//! never by in-memory flags, so restarts see the same lifecycle: the Bundle
//! is created together with the very first Factory and never again.

use tracing::{debug, info, instrument};

use crate::entities::{Bundle, EntityKind, Factory, BUNDLE_ID};
use crate::error::IndexerResult;
use crate::store::{EntityRecord, EntityStore, EntityStoreExt};

/// Factory with its `pair_count` already incremented, plus the Bundle if
/// this is the first Factory ever created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryDraft {
    /// Factory to persist.
    pub factory: Factory,
    /// Newly constructed Bundle, when one did not exist yet.
    pub bundle: Option<Bundle>,
}

impl FactoryDraft {
    /// Records to persist for this draft, Bundle first.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity cannot be encoded.
    pub fn records(&self) -> IndexerResult<Vec<EntityRecord>> {
        let mut records = Vec::with_capacity(2);
        if let Some(bundle) = &self.bundle {
            records.push(EntityRecord::encode(bundle)?);
        }
        records.push(EntityRecord::encode(&self.factory)?);
        Ok(records)
    }
}

/// Load or construct the Factory and count one more pair, without saving.
///
/// # Errors
///
/// Propagates store failures and undecodable Factory documents.
#[instrument(skip(store), level = "debug")]
pub async fn prepare_factory<S>(store: &S, factory_id: &str) -> IndexerResult<FactoryDraft>
where
    S: EntityStore + ?Sized,
{
    let (mut factory, bundle) = match store.load::<Factory>(factory_id).await? {
        Some(factory) => (factory, None),
        None => {
            info!(factory_id, "Creating factory");
            let bundle = if store.exists(EntityKind::Bundle, BUNDLE_ID).await? {
                None
            } else {
                Some(Bundle::new())
            };
            (Factory::new(factory_id), bundle)
        }
    };

    factory.pair_count += 1;
    debug!(pair_count = factory.pair_count, "Factory pair count incremented");

    Ok(FactoryDraft { factory, bundle })
}

/// Load or create the Factory, count one more pair and persist it at once.
///
/// On first-ever creation the Bundle is persisted in the same batch. The
/// save happens before the caller validates anything else, so an event
/// that is later aborted still leaves its increment behind.
///
/// # Errors
///
/// Propagates store failures and undecodable Factory documents.
pub async fn get_or_create_factory<S>(store: &S, factory_id: &str) -> IndexerResult<Factory>
where
    S: EntityStore + ?Sized,
{
    let draft = prepare_factory(store, factory_id).await?;
    store.save_records(draft.records()?).await?;
    Ok(draft.factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEntityStore;
    use rust_decimal::Decimal;

    const FACTORY: &str = "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f";

    #[tokio::test]
    async fn test_first_call_creates_factory_and_bundle() {
        let store = MemoryEntityStore::new();

        let factory = get_or_create_factory(&store, FACTORY).await.unwrap();

        assert_eq!(factory.pair_count, 1);
        let bundle: Bundle = store.load(BUNDLE_ID).await.unwrap().unwrap();
        assert_eq!(bundle.eth_price, Decimal::ZERO);
        let stored: Factory = store.load(FACTORY).await.unwrap().unwrap();
        assert_eq!(stored, factory);
    }

    #[tokio::test]
    async fn test_repeated_calls_increment_once_each() {
        let store = MemoryEntityStore::new();

        let first = get_or_create_factory(&store, FACTORY).await.unwrap();
        let second = get_or_create_factory(&store, FACTORY).await.unwrap();

        assert_eq!(first.pair_count, 1);
        assert_eq!(second.pair_count, 2);
        assert_eq!(store.count(EntityKind::Bundle).await, 1);
        assert_eq!(store.count(EntityKind::Factory).await, 1);
    }

    #[tokio::test]
    async fn test_bundle_never_recreated() {
        let store = MemoryEntityStore::new();
        get_or_create_factory(&store, FACTORY).await.unwrap();

        let mut bundle: Bundle = store.load(BUNDLE_ID).await.unwrap().unwrap();
        bundle.eth_price = Decimal::new(250_000, 2);
        store.save(&bundle).await.unwrap();

        get_or_create_factory(&store, FACTORY).await.unwrap();

        let bundle: Bundle = store.load(BUNDLE_ID).await.unwrap().unwrap();
        assert_eq!(bundle.eth_price, Decimal::new(250_000, 2));
        let saves = store.save_log().await;
        assert_eq!(
            saves.iter().filter(|(k, _)| *k == EntityKind::Bundle).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_prepare_does_not_persist() {
        let store = MemoryEntityStore::new();

        let draft = prepare_factory(&store, FACTORY).await.unwrap();

        assert_eq!(draft.factory.pair_count, 1);
        assert!(draft.bundle.is_some());
        assert_eq!(store.count(EntityKind::Factory).await, 0);
        assert_eq!(store.count(EntityKind::Bundle).await, 0);
    }

    #[tokio::test]
    async fn test_draft_records_put_bundle_first() {
        let store = MemoryEntityStore::new();
        let draft = prepare_factory(&store, FACTORY).await.unwrap();

        let kinds: Vec<_> = draft.records().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Bundle, EntityKind::Factory]);
    }
}
