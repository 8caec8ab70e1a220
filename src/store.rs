//! Entity store gateway.
//!
//! The synchronization core only needs two things from storage: load one
//! entity document by `(kind, key)` and save a batch of documents
//! atomically. [`EntityStore`] captures exactly that; typed access goes
//! through the blanket [`EntityStoreExt`] helpers.
//!
//! Two implementations ship with the crate:
//! - [`Repository`](crate::db::repository::Repository): SQLite-backed, used by the CLI
//! - [`MemoryEntityStore`]: in-process map, used by tests and dry runs

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::entities::{Entity, EntityKind};
use crate::error::{IndexerError, IndexerResult};

/// One serialized entity document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity key.
    pub id: String,
    /// JSON document.
    pub data: Value,
}

impl EntityRecord {
    /// Serialize a typed entity into a record.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::EntityError`] if the entity cannot be encoded.
    pub fn encode<E: Entity>(entity: &E) -> IndexerResult<Self> {
        let data = serde_json::to_value(entity).map_err(|e| {
            IndexerError::entity(
                format!("Failed to encode {} {}", E::KIND, entity.id()),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            kind: E::KIND,
            id: entity.id().to_string(),
            data,
        })
    }

    /// Deserialize the record back into a typed entity.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::EntityError`] on a kind mismatch or a
    /// malformed document.
    pub fn decode<E: Entity>(self) -> IndexerResult<E> {
        if self.kind != E::KIND {
            return Err(IndexerError::entity(
                format!("Expected {} document, found {} {}", E::KIND, self.kind, self.id),
                None,
            ));
        }

        serde_json::from_value(self.data).map_err(|e| {
            IndexerError::entity(
                format!("Failed to decode {} {}", E::KIND, self.id),
                Some(Box::new(e)),
            )
        })
    }
}

/// Key-value persistence of entity documents.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load a document, or `None` if no entity of `kind` has key `id`.
    async fn load_record(&self, kind: EntityKind, id: &str)
        -> IndexerResult<Option<EntityRecord>>;

    /// Upsert every record in order, all or nothing.
    async fn save_records(&self, records: Vec<EntityRecord>) -> IndexerResult<()>;
}

/// Typed helpers over any [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    /// Load and decode an entity.
    async fn load<E: Entity>(&self, id: &str) -> IndexerResult<Option<E>> {
        match self.load_record(E::KIND, id).await? {
            Some(record) => record.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Encode and save a single entity.
    async fn save<E: Entity>(&self, entity: &E) -> IndexerResult<()> {
        let record = EntityRecord::encode(entity)?;
        self.save_records(vec![record]).await
    }

    /// Whether an entity with this key exists.
    async fn exists(&self, kind: EntityKind, id: &str) -> IndexerResult<bool> {
        Ok(self.load_record(kind, id).await?.is_some())
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

/// In-memory [`EntityStore`].
///
/// Also records the sequence of saves so callers can assert commit order.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<(EntityKind, String), Value>,
    save_log: Vec<(EntityKind, String)>,
}

impl MemoryEntityStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of `kind`.
    pub async fn count(&self, kind: EntityKind) -> usize {
        self.inner
            .lock()
            .await
            .documents
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Every `(kind, key)` saved so far, in save order.
    pub async fn save_log(&self) -> Vec<(EntityKind, String)> {
        self.inner.lock().await.save_log.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load_record(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> IndexerResult<Option<EntityRecord>> {
        let state = self.inner.lock().await;
        Ok(state
            .documents
            .get(&(kind, id.to_string()))
            .map(|data| EntityRecord {
                kind,
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn save_records(&self, records: Vec<EntityRecord>) -> IndexerResult<()> {
        let mut state = self.inner.lock().await;
        for record in records {
            state.save_log.push((record.kind, record.id.clone()));
            state.documents.insert((record.kind, record.id), record.data);
        }
        Ok(())
    }
}
