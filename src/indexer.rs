//! Event ingestion: drives the pair-creation handler from chain logs.
//!
//! The factory's `PairCreated` logs are fetched in block batches of at most
//! `batch_size` blocks, decoded, put into canonical `(block, log index)`
//! order and handed to the handler one at a time. After each batch the sync
//! cursor in `indexer_state` is advanced; a batch that fails is not
//! recorded, so the next run starts over from its first block.
//!
//! A shutdown signal (see [`Indexer::with_shutdown`]) is honored between
//! batches, never inside one.

use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::db::repository::Repository;
use crate::entities::entity_id;
use crate::error::{IndexerError, IndexerResult};
use crate::events::{decode_pair_created, PairCreatedEvent};
use crate::handler::{PairCreatedHandler, PairCreationOutcome};
use crate::metadata::MetadataResolver;
use crate::registrar::PairRegistrar;
use crate::rpc::{fetch_pair_created_logs, get_block_timestamp, get_latest_block, Provider};
use crate::store::EntityStore;

const TIMESTAMP_CACHE_LIMIT: usize = 10_000;

/// Totals for a synced block range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// First block of the range.
    pub from_block: u64,
    /// Last block of the range.
    pub to_block: u64,
    /// `eth_getLogs` batches issued.
    pub batches: u64,
    /// Events handed to the handler.
    pub events: u64,
    /// Events that produced a Pair.
    pub committed: u64,
    /// Events aborted by the handler.
    pub aborted: u64,
    /// Events skipped as already indexed.
    pub duplicates: u64,
    /// Logs that did not decode as `PairCreated`.
    pub undecodable: u64,
    /// Stopped early on shutdown; `to_block` is the last completed block.
    pub interrupted: bool,
}

impl SyncReport {
    fn empty(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            ..Self::default()
        }
    }

    fn absorb(&mut self, other: &Self) {
        self.batches += other.batches;
        self.events += other.events;
        self.committed += other.committed;
        self.aborted += other.aborted;
        self.duplicates += other.duplicates;
        self.undecodable += other.undecodable;
    }

    fn record(&mut self, outcome: &PairCreationOutcome) {
        self.events += 1;
        match outcome {
            PairCreationOutcome::Committed { .. } => self.committed += 1,
            PairCreationOutcome::Aborted { .. } => self.aborted += 1,
            PairCreationOutcome::Duplicate { .. } => self.duplicates += 1,
        }
    }
}

/// Feed `events` to `handler` in canonical order.
///
/// The returned report has no block range set.
///
/// # Errors
///
/// Stops at the first infrastructure error returned by the handler.
pub async fn apply_events<S, M, R>(
    handler: &mut PairCreatedHandler<S, M, R>,
    mut events: Vec<PairCreatedEvent>,
) -> IndexerResult<SyncReport>
where
    S: EntityStore,
    M: MetadataResolver,
    R: PairRegistrar,
{
    events.sort_by_key(PairCreatedEvent::ordering_key);

    let mut report = SyncReport::default();
    for event in &events {
        let outcome = handler.handle_new_pair(event).await?;
        report.record(&outcome);
    }

    Ok(report)
}

/// Block-range synchronizer for one factory.
#[derive(Debug)]
pub struct Indexer<S, M, R> {
    provider: Provider,
    repository: Repository,
    handler: PairCreatedHandler<S, M, R>,
    factory: Address,
    batch_size: u64,
    timestamps: HashMap<u64, u64>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<S, M, R> Indexer<S, M, R>
where
    S: EntityStore,
    M: MetadataResolver,
    R: PairRegistrar,
{
    /// Indexer reading `factory` logs through `provider`.
    ///
    /// `repository` holds the sync cursor. A `batch_size` of zero is
    /// treated as one.
    pub fn new(
        provider: Provider,
        repository: Repository,
        handler: PairCreatedHandler<S, M, R>,
        factory: Address,
        batch_size: u64,
    ) -> Self {
        Self {
            provider,
            repository,
            handler,
            factory,
            batch_size: batch_size.max(1),
            timestamps: HashMap::new(),
            shutdown: None,
        }
    }

    /// Stop range syncs at the next batch boundary once `shutdown` holds `true`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// The wrapped handler.
    pub const fn handler(&self) -> &PairCreatedHandler<S, M, R> {
        &self.handler
    }

    /// Block after the stored cursor, or `default_start` when nothing has
    /// been indexed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be read.
    pub async fn resume_block(&self, default_start: u64) -> IndexerResult<u64> {
        let state = self.repository.get_state(&entity_id(&self.factory)).await?;
        Ok(state.map_or(default_start, |state| state.last_block() + 1))
    }

    /// Current chain head.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC request fails.
    pub async fn latest_block(&self) -> IndexerResult<u64> {
        get_latest_block(&self.provider).await
    }

    /// Sync from the stored cursor (or `default_start`) up to the chain head.
    ///
    /// # Errors
    ///
    /// Propagates RPC and store failures.
    pub async fn sync_to_head(&mut self, default_start: u64) -> IndexerResult<SyncReport> {
        let from_block = self.resume_block(default_start).await?;
        let head = self.latest_block().await?;

        if head < from_block {
            debug!(head, from_block, "No new blocks");
            return Ok(SyncReport::empty(from_block, head));
        }

        self.sync_range(from_block, head).await
    }

    /// Sync `[from_block, to_block]`, batch by batch.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ConfigError`] for an inverted range, and
    /// propagates RPC and store failures. Batches completed before the
    /// failure stay recorded. On shutdown the report comes back early with
    /// `interrupted` set.
    #[instrument(skip(self), fields(factory = %self.factory))]
    pub async fn sync_range(&mut self, from_block: u64, to_block: u64) -> IndexerResult<SyncReport> {
        if from_block > to_block {
            return Err(IndexerError::config(
                format!("Invalid block range {from_block}..={to_block}"),
                None,
            ));
        }

        let mut report = SyncReport::empty(from_block, to_block);
        let mut batch_start = from_block;

        while batch_start <= to_block {
            if self.shutdown_requested() {
                info!(next_block = batch_start, "Shutdown requested, stopping sync");
                report.interrupted = true;
                report.to_block = batch_start.saturating_sub(1);
                return Ok(report);
            }

            let batch_end = batch_start
                .saturating_add(self.batch_size - 1)
                .min(to_block);

            let batch = self.sync_batch(batch_start, batch_end).await?;
            report.absorb(&batch);

            if batch_end == u64::MAX {
                break;
            }
            batch_start = batch_end + 1;
        }

        info!(
            from_block,
            to_block,
            events = report.events,
            committed = report.committed,
            aborted = report.aborted,
            "Sync complete"
        );

        Ok(report)
    }

    async fn sync_batch(&mut self, from_block: u64, to_block: u64) -> IndexerResult<SyncReport> {
        debug!(from_block, to_block, "Fetching batch");

        let logs = fetch_pair_created_logs(&self.provider, self.factory, from_block, to_block).await?;

        let mut events = Vec::with_capacity(logs.len());
        let mut undecodable = 0;
        for log in &logs {
            if log.removed {
                continue;
            }
            let fallback = self.fallback_timestamp(log).await?;
            match decode_pair_created(log, fallback) {
                Ok(event) => events.push(event),
                Err(e) => {
                    undecodable += 1;
                    warn!(
                        block_number = ?log.block_number,
                        tx_hash = ?log.transaction_hash,
                        error = %e,
                        "Skipping undecodable factory log"
                    );
                }
            }
        }

        let last_hash = last_block_hash(&events, to_block);
        let mut report = apply_events(&mut self.handler, events).await?;
        report.from_block = from_block;
        report.to_block = to_block;
        report.batches = 1;
        report.undecodable = undecodable;

        self.repository
            .update_state(&entity_id(&self.factory), to_block, last_hash, report.events)
            .await?;

        if report.events > 0 {
            info!(
                from_block,
                to_block,
                events = report.events,
                committed = report.committed,
                "Processed batch"
            );
        }

        Ok(report)
    }

    /// Header timestamp for logs whose node did not include one.
    async fn fallback_timestamp(&mut self, log: &Log) -> IndexerResult<Option<u64>> {
        if log.block_timestamp.is_some() {
            return Ok(None);
        }
        let Some(number) = log.block_number else {
            return Ok(None);
        };

        if let Some(timestamp) = self.timestamps.get(&number) {
            return Ok(Some(*timestamp));
        }

        let timestamp = get_block_timestamp(&self.provider, number).await?;
        if self.timestamps.len() >= TIMESTAMP_CACHE_LIMIT {
            self.timestamps.clear();
        }
        self.timestamps.insert(number, timestamp);

        Ok(Some(timestamp))
    }
}

/// Hash of `to_block`, when one of the events was emitted in it.
fn last_block_hash(events: &[PairCreatedEvent], to_block: u64) -> Option<B256> {
    events
        .iter()
        .find(|event| event.block_number == to_block)
        .map(|event| event.block_hash)
}
