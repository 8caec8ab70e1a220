//! Error types for the factory synchronizer.
//!
//! This module provides a unified error type [`IndexerError`] for the
//! infrastructure failures that can interrupt indexing: configuration,
//! RPC transport, log decoding, storage and entity serialization.
//!
//! # Design
//!
//! Domain-level failures of the pair-creation handler (unresolved token
//! decimals and similar) are *not* errors. They are reported as
//! [`PairCreationOutcome::Aborted`](crate::handler::PairCreationOutcome::Aborted)
//! together with a warning log, and indexing continues. An [`IndexerError`]
//! means the environment is broken and the runtime loop should retry later.
//!
//! The variants are organized by layer:
//! - [`IndexerError::ConfigError`]: Configuration and environment issues
//! - [`IndexerError::RpcError`]: RPC provider and network errors
//! - [`IndexerError::DecodingError`]: Event decoding and parsing errors
//! - [`IndexerError::DatabaseError`]: Entity store and SQL errors
//! - [`IndexerError::EntityError`]: Entity document (de)serialization errors
//!
//! Token metadata lookups never fail: resolvers fold call failures into
//! fallback values, so there is no metadata variant.
//!
//! # Example
//!
//! ```
//! use uniswap_factory_sync::error::{IndexerError, IndexerResult};
//!
//! fn validate_batch_size(size: u64) -> IndexerResult<()> {
//!     if size == 0 {
//!         return Err(IndexerError::config("BATCH_SIZE cannot be zero", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`IndexerError`].
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Boxed source error carried by [`IndexerError`] variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the factory synchronizer.
#[derive(Debug)]
pub enum IndexerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing or invalid environment variables
    /// - Invalid addresses or URLs
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// RPC provider or network errors.
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Event decoding or parsing errors.
    ///
    /// Variants include:
    /// - Signature mismatch
    /// - Log missing block or transaction metadata
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Entity store errors.
    ///
    /// Variants include:
    /// - Connection failures
    /// - Migration failures
    /// - Transaction errors
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Entity document could not be encoded or decoded.
    EntityError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl IndexerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use uniswap_factory_sync::error::IndexerError;
    ///
    /// let err = IndexerError::config("RPC_URL not set", None);
    /// assert!(matches!(err, IndexerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use uniswap_factory_sync::error::IndexerError;
    ///
    /// let err = IndexerError::decoding("Log missing block hash", None);
    /// assert!(matches!(err, IndexerError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new database error.
    #[must_use]
    pub fn database(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new entity (de)serialization error.
    #[must_use]
    pub fn entity(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::EntityError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::EntityError { message, .. } => write!(f, "Entity error: {message}"),
        }
    }
}

impl std::error::Error for IndexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::EntityError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = IndexerError::config("test error", None);
        assert!(matches!(err, IndexerError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_rpc_error() {
        let err = IndexerError::rpc("connection failed", None);
        assert_eq!(err.to_string(), "RPC error: connection failed");
    }

    #[test]
    fn test_database_error() {
        let err = IndexerError::database("locked", None);
        assert!(matches!(err, IndexerError::DatabaseError { .. }));
        assert_eq!(err.to_string(), "Database error: locked");
    }

    #[test]
    fn test_entity_error() {
        let err = IndexerError::entity("bad token document", None);
        assert!(matches!(err, IndexerError::EntityError { .. }));
        assert_eq!(err.to_string(), "Entity error: bad token document");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = IndexerError::database("failed to open", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Database error: failed to open");
    }
}
