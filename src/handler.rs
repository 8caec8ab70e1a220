//! `PairCreated` handler: turns one factory event into entity mutations.
//!
//! ## Stages
//!
//! ```text
//! Start ──► FactoryReady ──► TokensReady ──► Validated ──► Committed
//!   │            │                │
//!   └────────────┴────────────────┴──────► Aborted (warning logged)
//! ```
//!
//! 1. **FactoryReady**: the Factory is loaded or created and its
//!    `pair_count` incremented. By default this increment is saved
//!    immediately (see [`HandlerOptions::atomic_factory_count`]).
//! 2. **TokensReady**: both Tokens are loaded or created; new tokens have
//!    their metadata resolved.
//! 3. **Validated**: both Tokens report decimals.
//! 4. **Committed**: the Pair is built, monitoring is requested for the pair
//!    address, and Token0, Token1, Pair, Factory are saved in one batch.
//!
//! An aborted event is not an error. It is logged with its block number,
//! block hash and transaction hash, and the next event is processed as
//! usual. Only infrastructure failures (store I/O) surface as `Err`.
//!
//! ## Known inconsistency
//!
//! With default options an event aborted after stage 1 still leaves the
//! Factory's `pair_count` incremented, so the count can exceed the number
//! of stored Pairs. Replaying an event likewise counts it again. Both are
//! kept unless [`HandlerOptions`] opts out of them.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::entities::{entity_id, EntityKind, Pair, Token};
use crate::error::{IndexerError, IndexerResult};
use crate::events::PairCreatedEvent;
use crate::metadata::MetadataResolver;
use crate::registrar::PairRegistrar;
use crate::registry::{prepare_factory, FactoryDraft};
use crate::store::{EntityRecord, EntityStore, EntityStoreExt};
use crate::tokens::get_or_create_token;

/// Behavior switches for [`PairCreatedHandler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Acknowledge an event whose Pair already exists without touching the
    /// Factory, so redelivered events are not counted twice.
    pub skip_existing_pairs: bool,
    /// Save the Factory (and a first Bundle) only in the final commit batch,
    /// so aborted events leave no trace at all.
    pub atomic_factory_count: bool,
}

/// Processing stage of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairCreationStage {
    /// Nothing done yet.
    Start,
    /// Factory loaded or created and counted.
    FactoryReady,
    /// Both tokens loaded or created.
    TokensReady,
    /// Both tokens have decimals.
    Validated,
    /// Entities saved.
    Committed,
}

impl fmt::Display for PairCreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::FactoryReady => "factory_ready",
            Self::TokensReady => "tokens_ready",
            Self::Validated => "validated",
            Self::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Why an event was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The Factory record could not be obtained.
    FactoryUnavailable,
    /// A Token record could not be obtained.
    TokenUnavailable {
        /// Token key.
        token: String,
    },
    /// A Token has no decimals.
    DecimalsUnresolved {
        /// Token key.
        token: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FactoryUnavailable => write!(f, "factory unavailable"),
            Self::TokenUnavailable { token } => write!(f, "token {token} unavailable"),
            Self::DecimalsUnresolved { token } => write!(f, "decimals unresolved for {token}"),
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairCreationOutcome {
    /// Pair, tokens and factory were saved.
    Committed {
        /// Pair key.
        pair: String,
        /// Factory `pair_count` after this event.
        pair_count: u64,
    },
    /// Processing stopped; see [`AbortReason`].
    Aborted {
        /// Last stage reached before aborting.
        stage: PairCreationStage,
        /// Cause.
        reason: AbortReason,
    },
    /// The Pair already existed and the event was skipped
    /// (only with [`HandlerOptions::skip_existing_pairs`]).
    Duplicate {
        /// Pair key.
        pair: String,
    },
}

impl PairCreationOutcome {
    /// Whether the event produced a Pair.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Running totals of handled events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    /// Events that produced a Pair.
    pub committed: u64,
    /// Events aborted with a warning.
    pub aborted: u64,
    /// Events skipped as already indexed.
    pub duplicates: u64,
}

impl HandlerStats {
    fn record(&mut self, outcome: &PairCreationOutcome) {
        match outcome {
            PairCreationOutcome::Committed { .. } => self.committed += 1,
            PairCreationOutcome::Aborted { .. } => self.aborted += 1,
            PairCreationOutcome::Duplicate { .. } => self.duplicates += 1,
        }
    }
}

/// Handler for the factory's `PairCreated` events.
///
/// Owns its collaborators and takes `&mut self` per event, so a handler
/// processes one event at a time.
#[derive(Debug)]
pub struct PairCreatedHandler<S, M, R> {
    factory_id: String,
    store: S,
    resolver: M,
    registrar: R,
    options: HandlerOptions,
    stats: HandlerStats,
}

impl<S, M, R> PairCreatedHandler<S, M, R>
where
    S: EntityStore,
    M: MetadataResolver,
    R: PairRegistrar,
{
    /// Handler for events of the factory keyed `factory_id`.
    pub fn new(
        factory_id: impl Into<String>,
        store: S,
        resolver: M,
        registrar: R,
        options: HandlerOptions,
    ) -> Self {
        Self {
            factory_id: factory_id.into(),
            store,
            resolver,
            registrar,
            options,
            stats: HandlerStats::default(),
        }
    }

    /// Factory key this handler writes to.
    #[must_use]
    pub fn factory_id(&self) -> &str {
        &self.factory_id
    }

    /// Entity store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Metadata resolver.
    pub const fn resolver(&self) -> &M {
        &self.resolver
    }

    /// Monitoring registrar.
    pub const fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Totals since construction.
    pub const fn stats(&self) -> HandlerStats {
        self.stats
    }

    /// Process one `PairCreated` event.
    ///
    /// # Errors
    ///
    /// Only store I/O failures are returned. Every domain failure ends in
    /// [`PairCreationOutcome::Aborted`].
    #[instrument(
        skip(self, event),
        fields(pair = %event.pair, block_number = event.block_number, log_index = event.log_index)
    )]
    pub async fn handle_new_pair(
        &mut self,
        event: &PairCreatedEvent,
    ) -> IndexerResult<PairCreationOutcome> {
        let outcome = self.process(event).await?;
        self.stats.record(&outcome);
        Ok(outcome)
    }

    async fn process(&self, event: &PairCreatedEvent) -> IndexerResult<PairCreationOutcome> {
        let pair_id = entity_id(&event.pair);

        if self.options.skip_existing_pairs && self.store.exists(EntityKind::Pair, &pair_id).await?
        {
            debug!(pair = %pair_id, "Pair already indexed, skipping event");
            return Ok(PairCreationOutcome::Duplicate { pair: pair_id });
        }

        // Start -> FactoryReady
        let Some(draft) = self.factory_draft().await? else {
            return Ok(abort(event, PairCreationStage::Start, AbortReason::FactoryUnavailable));
        };
        if !self.options.atomic_factory_count {
            // Saved now on purpose: survives any abort below.
            self.store.save_records(draft.records()?).await?;
        }

        // FactoryReady -> TokensReady
        let Some(token0) = self.token(event.token0).await? else {
            return Ok(abort(
                event,
                PairCreationStage::FactoryReady,
                AbortReason::TokenUnavailable {
                    token: entity_id(&event.token0),
                },
            ));
        };
        let Some(token1) = self.token(event.token1).await? else {
            return Ok(abort(
                event,
                PairCreationStage::FactoryReady,
                AbortReason::TokenUnavailable {
                    token: entity_id(&event.token1),
                },
            ));
        };

        // TokensReady -> Validated
        match (token0.decimals, token1.decimals) {
            (Some(_), Some(_)) => {}
            (None, _) => {
                return Ok(abort(
                    event,
                    PairCreationStage::TokensReady,
                    AbortReason::DecimalsUnresolved { token: token0.id },
                ));
            }
            (_, None) => {
                return Ok(abort(
                    event,
                    PairCreationStage::TokensReady,
                    AbortReason::DecimalsUnresolved { token: token1.id },
                ));
            }
        }

        // Validated -> Committed
        let pair = Pair::new(
            pair_id.clone(),
            token0.id.clone(),
            token1.id.clone(),
            event.block_timestamp,
            event.block_number,
        );

        self.registrar
            .register_pair_address(event.pair, event.block_number)
            .await;

        let mut batch = vec![
            EntityRecord::encode(&token0)?,
            EntityRecord::encode(&token1)?,
            EntityRecord::encode(&pair)?,
        ];
        if self.options.atomic_factory_count {
            if let Some(bundle) = &draft.bundle {
                batch.push(EntityRecord::encode(bundle)?);
            }
        }
        batch.push(EntityRecord::encode(&draft.factory)?);
        self.store.save_records(batch).await?;

        info!(
            pair = %pair_id,
            token0 = %token0.symbol,
            token1 = %token1.symbol,
            pair_count = draft.factory.pair_count,
            "Pair created"
        );

        Ok(PairCreationOutcome::Committed {
            pair: pair_id,
            pair_count: draft.factory.pair_count,
        })
    }

    async fn factory_draft(&self) -> IndexerResult<Option<FactoryDraft>> {
        available(prepare_factory(&self.store, &self.factory_id).await)
    }

    async fn token(&self, address: alloy::primitives::Address) -> IndexerResult<Option<Token>> {
        available(get_or_create_token(&self.store, &self.resolver, address).await)
    }
}

/// An undecodable stored document makes that entity unavailable to this
/// event; every other error is propagated.
fn available<T>(result: IndexerResult<T>) -> IndexerResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ IndexerError::EntityError { .. }) => {
            warn!(error = %e, "Stored entity unusable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn abort(
    event: &PairCreatedEvent,
    stage: PairCreationStage,
    reason: AbortReason,
) -> PairCreationOutcome {
    warn!(
        block_number = event.block_number,
        block_hash = %event.block_hash,
        tx_hash = %event.transaction_hash,
        %stage,
        %reason,
        "Pair creation aborted"
    );
    PairCreationOutcome::Aborted { stage, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record() {
        let mut stats = HandlerStats::default();
        stats.record(&PairCreationOutcome::Committed {
            pair: "0xp".to_string(),
            pair_count: 1,
        });
        stats.record(&PairCreationOutcome::Aborted {
            stage: PairCreationStage::TokensReady,
            reason: AbortReason::DecimalsUnresolved {
                token: "0xc".to_string(),
            },
        });
        stats.record(&PairCreationOutcome::Duplicate {
            pair: "0xp".to_string(),
        });

        assert_eq!(
            stats,
            HandlerStats {
                committed: 1,
                aborted: 1,
                duplicates: 1
            }
        );
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::DecimalsUnresolved {
            token: "0xccc".to_string(),
        };
        assert_eq!(reason.to_string(), "decimals unresolved for 0xccc");
        assert_eq!(PairCreationStage::FactoryReady.to_string(), "factory_ready");
    }
}
