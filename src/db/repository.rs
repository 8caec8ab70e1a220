//! Repository pattern for database operations.
//!
//! Provides the SQLite [`EntityStore`] used in production, plus the
//! bookkeeping the runtime needs around it: tracked pair registrations
//! and the per-factory sync cursor.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{EntityRow, IndexerState, TrackedPairRecord};
use crate::entities::EntityKind;
use crate::error::{IndexerError, IndexerResult};
use crate::store::{EntityRecord, EntityStore};

/// Repository for database operations.
///
/// Wraps a SQLite connection pool and provides type-safe methods
/// for all database interactions.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== ENTITY QUERIES ====================

    /// Lists every entity document of `kind`, ordered by key.
    pub async fn list_records(&self, kind: EntityKind) -> IndexerResult<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT kind, id, data, updated_at FROM entities WHERE kind = ? ORDER BY id",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::database(format!("Failed to list {kind} entities"), Some(Box::new(e)))
        })?;

        rows.into_iter().map(|row| decode_row(kind, row)).collect()
    }

    /// Number of stored entities of `kind`.
    pub async fn count_entities(&self, kind: EntityKind) -> IndexerResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::database(
                    format!("Failed to count {kind} entities"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(count)
    }

    // ==================== TRACKED PAIRS ====================

    /// Records a pair address for dynamic monitoring.
    ///
    /// Registering the same address again keeps the original row.
    pub async fn insert_tracked_pair(
        &self,
        address: Address,
        block_number: u64,
    ) -> IndexerResult<()> {
        let record = TrackedPairRecord::new(address, block_number);

        sqlx::query(
            r#"
            INSERT INTO tracked_pairs (address, registered_at_block, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(&record.address)
        .bind(record.registered_at_block)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::database("Failed to insert tracked pair", Some(Box::new(e)))
        })?;

        Ok(())
    }

    /// All tracked pairs in registration-block order.
    pub async fn get_tracked_pairs(&self) -> IndexerResult<Vec<TrackedPairRecord>> {
        sqlx::query_as::<_, TrackedPairRecord>(
            "SELECT address, registered_at_block, created_at FROM tracked_pairs ORDER BY registered_at_block, address",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to query tracked pairs", Some(Box::new(e))))
    }

    // ==================== INDEXER STATE ====================

    /// Gets the sync cursor for a factory.
    pub async fn get_state(&self, factory_address: &str) -> IndexerResult<Option<IndexerState>> {
        sqlx::query_as::<_, IndexerState>(
            r#"
            SELECT factory_address, last_indexed_block, last_block_hash,
                   total_events_processed, updated_at
            FROM indexer_state WHERE factory_address = ?
            "#,
        )
        .bind(factory_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to query indexer state", Some(Box::new(e))))
    }

    /// Advances the sync cursor for a factory.
    ///
    /// The cursor never moves backwards: re-syncing an older range keeps the
    /// stored block and hash. `events_processed` is added to the running
    /// total either way.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn update_state(
        &self,
        factory_address: &str,
        last_block: u64,
        last_block_hash: Option<B256>,
        events_processed: u64,
    ) -> IndexerResult<()> {
        let hash = last_block_hash.map(|h| format!("{h:?}"));

        sqlx::query(
            r#"
            INSERT INTO indexer_state (
                factory_address, last_indexed_block, last_block_hash,
                total_events_processed, updated_at
            )
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (factory_address) DO UPDATE SET
                last_indexed_block = MAX(indexer_state.last_indexed_block, excluded.last_indexed_block),
                last_block_hash = CASE
                    WHEN excluded.last_indexed_block >= indexer_state.last_indexed_block
                        THEN excluded.last_block_hash
                    ELSE indexer_state.last_block_hash
                END,
                total_events_processed = indexer_state.total_events_processed + excluded.total_events_processed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(factory_address)
        .bind(last_block as i64)
        .bind(hash)
        .bind(events_processed as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to update indexer state", Some(Box::new(e))))?;

        Ok(())
    }
}

fn decode_row(kind: EntityKind, row: EntityRow) -> IndexerResult<EntityRecord> {
    let data = serde_json::from_str(&row.data).map_err(|e| {
        IndexerError::entity(
            format!("Stored {kind} {} is not valid JSON", row.id),
            Some(Box::new(e)),
        )
    })?;

    Ok(EntityRecord {
        kind,
        id: row.id,
        data,
    })
}

#[async_trait]
impl EntityStore for Repository {
    #[instrument(skip(self), level = "debug")]
    async fn load_record(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> IndexerResult<Option<EntityRecord>> {
        let row = sqlx::query_as::<_, EntityRow>(
            "SELECT kind, id, data, updated_at FROM entities WHERE kind = ? AND id = ?",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::database(format!("Failed to load {kind} {id}"), Some(Box::new(e)))
        })?;

        row.map(|row| decode_row(kind, row)).transpose()
    }

    #[instrument(skip(self, records), fields(count = records.len()), level = "debug")]
    async fn save_records(&self, records: Vec<EntityRecord>) -> IndexerResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            IndexerError::database("Failed to start transaction", Some(Box::new(e)))
        })?;

        let now = chrono::Utc::now().timestamp();

        for record in &records {
            let data = serde_json::to_string(&record.data).map_err(|e| {
                IndexerError::entity(
                    format!("Failed to serialize {} {}", record.kind, record.id),
                    Some(Box::new(e)),
                )
            })?;

            sqlx::query(
                r#"
                INSERT INTO entities (kind, id, data, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (kind, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(record.kind.as_str())
            .bind(&record.id)
            .bind(data)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                IndexerError::database(
                    format!("Failed to save {} {}", record.kind, record.id),
                    Some(Box::new(e)),
                )
            })?;
        }

        tx.commit().await.map_err(|e| {
            IndexerError::database("Failed to commit transaction", Some(Box::new(e)))
        })?;

        debug!(count = records.len(), "Saved entity batch");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use crate::entities::{Bundle, Factory, Pair, Token};
    use crate::store::EntityStoreExt;
    use alloy::primitives::{address, b256, U256};

    async fn setup_test_db() -> Repository {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        Repository::new(pool)
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let repo = setup_test_db().await;
        let token = Token::new(
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "WETH",
            "Wrapped Ether",
            Some(18),
            U256::from(3_000_000_000_000_000_000_000_000u128),
        );

        repo.save(&token).await.expect("Failed to save token");
        let loaded: Token = repo
            .load(&token.id)
            .await
            .expect("Failed to load token")
            .expect("Token should exist");

        assert_eq!(loaded, token);
    }

    #[tokio::test]
    async fn test_pair_round_trip() {
        let repo = setup_test_db().await;
        let pair = Pair::new("0xpair", "0xaaa", "0xbbb", 1_589_000_000, 10_008_355);

        repo.save(&pair).await.expect("Failed to save pair");
        let loaded: Option<Pair> = repo.load("0xpair").await.expect("Failed to load pair");

        assert_eq!(loaded, Some(pair));
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_document() {
        let repo = setup_test_db().await;
        let mut factory = Factory::new("0xf");
        repo.save(&factory).await.unwrap();

        factory.pair_count = 7;
        repo.save(&factory).await.unwrap();

        let loaded: Factory = repo.load("0xf").await.unwrap().unwrap();
        assert_eq!(loaded.pair_count, 7);
        assert_eq!(repo.count_entities(EntityKind::Factory).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_kinds_do_not_collide() {
        let repo = setup_test_db().await;
        repo.save(&Bundle::new()).await.unwrap();

        let factory: Option<Factory> = repo.load("1").await.unwrap();
        assert!(factory.is_none());
    }

    #[tokio::test]
    async fn test_batch_save_and_list() {
        let repo = setup_test_db().await;
        let records = vec![
            EntityRecord::encode(&Token::new("0xbbb", "B", "B", Some(6), U256::ZERO)).unwrap(),
            EntityRecord::encode(&Token::new("0xaaa", "A", "A", Some(18), U256::ZERO)).unwrap(),
        ];
        repo.save_records(records).await.unwrap();

        let listed = repo.list_records(EntityKind::Token).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0xaaa", "0xbbb"]);
    }

    #[tokio::test]
    async fn test_tracked_pairs_are_deduplicated() {
        let repo = setup_test_db().await;
        let pair = address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc");

        repo.insert_tracked_pair(pair, 10_008_355).await.unwrap();
        repo.insert_tracked_pair(pair, 10_008_400).await.unwrap();

        let tracked = repo.get_tracked_pairs().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].registered_at_block, 10_008_355);
    }

    #[tokio::test]
    async fn test_state_management() {
        let repo = setup_test_db().await;

        assert!(repo.get_state("0xf").await.unwrap().is_none());

        let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        repo.update_state("0xf", 10_000_900, Some(hash), 2)
            .await
            .unwrap();
        repo.update_state("0xf", 10_001_900, None, 3).await.unwrap();

        let state = repo
            .get_state("0xf")
            .await
            .unwrap()
            .expect("State should exist");
        assert_eq!(state.last_block(), 10_001_900);
        assert_eq!(state.total_events_processed, 5);
        assert!(state.block_hash().is_none());
    }

    #[tokio::test]
    async fn test_state_never_moves_backwards() {
        let repo = setup_test_db().await;
        let hash = b256!("2222222222222222222222222222222222222222222222222222222222222222");

        repo.update_state("0xf", 1000, Some(hash), 4).await.unwrap();
        repo.update_state("0xf", 150, None, 1).await.unwrap();

        let state = repo.get_state("0xf").await.unwrap().unwrap();
        assert_eq!(state.last_block(), 1000);
        assert_eq!(state.block_hash(), Some(hash));
        assert_eq!(state.total_events_processed, 5);
    }
}
