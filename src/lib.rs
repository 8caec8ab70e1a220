//! # Uniswap V2 Factory Indexer
//!
//! Materializes the Uniswap V2 factory's `PairCreated` events into a
//! persistent entity graph, using [Alloy](https://github.com/alloy-rs/alloy)
//! for chain access and SQLite for storage.
//!
//! Each event passes through [`handler::PairCreatedHandler`]:
//!
//! 1. The [`entities::Factory`] singleton is loaded or created (with the
//!    [`entities::Bundle`] on first creation) and its `pair_count` bumped.
//! 2. Both [`entities::Token`]s are loaded, or created from ERC-20 metadata
//!    resolved through [`metadata::MetadataResolver`].
//! 3. Tokens without decimals abort the event with a warning.
//! 4. The [`entities::Pair`] is built, its address is handed to the
//!    [`registrar::PairRegistrar`] for monitoring, and everything is saved
//!    in one batch through [`store::EntityStore`].
//!
//! [`indexer::Indexer`] feeds the handler from `eth_getLogs` in canonical
//! block/log order and keeps a per-factory cursor.
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use uniswap_factory_sync::db::{create_pool, repository::Repository};
//! use uniswap_factory_sync::entities::entity_id;
//! use uniswap_factory_sync::events::{UNISWAP_V2_FACTORY, UNISWAP_V2_FACTORY_START_BLOCK};
//! use uniswap_factory_sync::handler::{HandlerOptions, PairCreatedHandler};
//! use uniswap_factory_sync::indexer::Indexer;
//! use uniswap_factory_sync::metadata::RpcMetadataResolver;
//! use uniswap_factory_sync::registrar::StoredPairRegistrar;
//! use uniswap_factory_sync::rpc::create_provider;
//!
//! # async fn example() -> uniswap_factory_sync::error::IndexerResult<()> {
//! let provider = create_provider("http://localhost:8545").await?;
//! let repository = Repository::new(create_pool("sqlite:./factory.db").await?);
//!
//! let handler = PairCreatedHandler::new(
//!     entity_id(&UNISWAP_V2_FACTORY),
//!     repository.clone(),
//!     RpcMetadataResolver::new(provider.clone()),
//!     StoredPairRegistrar::new(repository.clone()),
//!     HandlerOptions::default(),
//! );
//! let mut indexer = Indexer::new(provider, repository, handler, UNISWAP_V2_FACTORY, 1000);
//!
//! let report = indexer
//!     .sync_range(UNISWAP_V2_FACTORY_START_BLOCK, UNISWAP_V2_FACTORY_START_BLOCK + 10_000)
//!     .await?;
//! println!("{} pairs committed", report.committed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`error::IndexerResult<T>`](error::IndexerResult).
//! Aborted events are not errors; they come back as
//! [`handler::PairCreationOutcome::Aborted`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod events;
pub mod handler;
pub mod indexer;
pub mod metadata;
pub mod observability;
pub mod registrar;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod tokens;
