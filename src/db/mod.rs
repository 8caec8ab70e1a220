//! Database module for persistent storage of the entity graph.
//!
//! This module provides SQLite-based storage for:
//! - Entity documents (Factory, Bundle, Token, Pair) keyed by kind and id
//! - Tracked pair addresses registered for dynamic monitoring
//! - Indexer cursor (last fully processed block)
//!
//! # Architecture
//!
//! - `models`: Row structures that map to database tables
//! - `repository`: [`EntityStore`](crate::store::EntityStore) implementation and cursor/registration queries
//! - Connection pooling with SQLite WAL mode
//! - Migration system for schema versioning

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::IndexerError;

pub mod models;
pub mod repository;

/// Tables the schema must contain after migrations.
const REQUIRED_TABLES: [&str; 3] = ["entities", "tracked_pairs", "indexer_state"];

/// Creates a SQLite connection pool with optimized settings and applies migrations.
///
/// # Configuration
///
/// - **WAL mode**: Enables concurrent readers during writes
/// - **Busy timeout**: 30 seconds to handle lock contention
/// - **Max connections**: 5, or 1 for `:memory:` databases (each
///   in-memory connection would otherwise see its own empty database)
///
/// # Example
///
/// ```no_run
/// use uniswap_factory_sync::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./factory.db").await?;
///     Ok(())
/// }
/// ```
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, IndexerError> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            IndexerError::database(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            IndexerError::database(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Runs database migrations to ensure schema is up-to-date.
///
/// Migrations are embedded from the `migrations/` directory at compile time
/// and are idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), IndexerError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            IndexerError::database("Failed to run database migrations", Some(Box::new(e)))
        })?;

    Ok(())
}

/// Verify that required tables exist after migrations.
pub async fn verify_database(pool: &SqlitePool) -> Result<(), IndexerError> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT name FROM sqlite_master
        WHERE type='table' AND name IN ('entities', 'tracked_pairs', 'indexer_state')
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| IndexerError::database("Failed to verify database schema", Some(Box::new(e))))?;

    if rows.len() < REQUIRED_TABLES.len() {
        return Err(IndexerError::database(
            format!(
                "Database schema incomplete. Expected {} tables, found {}",
                REQUIRED_TABLES.len(),
                rows.len()
            ),
            None,
        ));
    }

    Ok(())
}
