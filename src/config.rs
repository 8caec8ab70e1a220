//! Configuration management for the factory indexer.
//!
//! Values come from environment variables, with a `.env` file loaded first
//! through `dotenvy` when present. Every failure is reported as
//! [`IndexerError::ConfigError`].
//!
//! ## Environment Variables
//!
//! One of (needed only by commands that talk to a node):
//! - `RPC_URL`: full HTTP(S) endpoint of an Ethereum node
//! - `ALCHEMY_API_KEY`: Alchemy key, expanded to the mainnet endpoint
//!
//! Optional (with defaults):
//! - `DATABASE_URL`: SQLite URL (default: `sqlite:./factory.db`)
//! - `FACTORY_ADDRESS`: factory contract (default: Uniswap V2 mainnet factory)
//! - `START_BLOCK`: first block to index (default: 10000834)
//! - `BATCH_SIZE`: maximum blocks per `eth_getLogs` (default: 1000)
//! - `POLL_INTERVAL_SECS`: polling interval in watch mode (default: 12)
//! - `SKIP_EXISTING_PAIRS`: skip events whose pair is already stored (default: false)
//! - `ATOMIC_FACTORY_COUNT`: save the factory only with the pair (default: false)
//! - `RUST_LOG`, `LOG_JSON`, `LOG_FILE`: see [`crate::observability`]
//!
//! ## Example
//!
//! ```no_run
//! use uniswap_factory_sync::config::Config;
//! use uniswap_factory_sync::error::IndexerResult;
//!
//! # fn main() -> IndexerResult<()> {
//! let config = Config::from_env()?;
//! println!("Indexing factory {}", config.factory_address());
//! # Ok(())
//! # }
//! ```

use crate::error::{IndexerError, IndexerResult};
use crate::events::{UNISWAP_V2_FACTORY, UNISWAP_V2_FACTORY_START_BLOCK};
use crate::handler::HandlerOptions;
use alloy::primitives::Address;
use std::env;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite:./factory.db";
const ALCHEMY_PLACEHOLDER: &str = "your_alchemy_api_key_here";

/// Runtime configuration of the indexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ethereum RPC URL, if one was configured
    rpc_url: Option<String>,

    /// SQLite database URL
    database_url: String,

    /// Factory contract whose events are indexed
    factory_address: Address,

    /// First block to index when no cursor is stored
    start_block: u64,

    /// Maximum blocks to fetch per query
    batch_size: u64,

    /// Polling interval in seconds (for watch mode)
    poll_interval_secs: u64,

    /// Handler behavior switches
    handler_options: HandlerOptions,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `RPC_URL` wins over `ALCHEMY_API_KEY` when both are set. Having
    /// neither is not an error here; see [`Config::rpc_url`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `ALCHEMY_API_KEY` is set but empty or still the placeholder
    /// - A numeric or boolean variable does not parse
    /// - `FACTORY_ADDRESS` is not `0x` followed by 40 hex characters
    /// - `BATCH_SIZE` is zero
    pub fn from_env() -> IndexerResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let rpc_url = rpc_url_from_env()?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let factory_address = match env::var("FACTORY_ADDRESS") {
            Ok(raw) => parse_address(&raw)?,
            Err(_) => UNISWAP_V2_FACTORY,
        };

        let start_block = parse_var("START_BLOCK", UNISWAP_V2_FACTORY_START_BLOCK)?;

        let batch_size: u64 = parse_var("BATCH_SIZE", 1000)?;
        if batch_size == 0 {
            return Err(IndexerError::config("BATCH_SIZE must be at least 1", None));
        }

        let poll_interval_secs = parse_var("POLL_INTERVAL_SECS", 12)?;

        let handler_options = HandlerOptions {
            skip_existing_pairs: parse_var("SKIP_EXISTING_PAIRS", false)?,
            atomic_factory_count: parse_var("ATOMIC_FACTORY_COUNT", false)?,
        };

        Ok(Self {
            rpc_url,
            database_url,
            factory_address,
            start_block,
            batch_size,
            poll_interval_secs,
            handler_options,
        })
    }

    /// Get the Ethereum RPC URL.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `RPC_URL` nor `ALCHEMY_API_KEY` was set.
    pub fn rpc_url(&self) -> IndexerResult<&str> {
        self.rpc_url.as_deref().ok_or_else(|| {
            IndexerError::config(
                "RPC_URL or ALCHEMY_API_KEY environment variable is required",
                None,
            )
        })
    }

    /// Get the SQLite database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the factory contract address.
    #[must_use]
    pub const fn factory_address(&self) -> Address {
        self.factory_address
    }

    /// Get the first block to index.
    #[must_use]
    pub const fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Get the batch size (max blocks per query).
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Get the polling interval in seconds.
    #[must_use]
    pub const fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    /// Get the handler options.
    #[must_use]
    pub const fn handler_options(&self) -> HandlerOptions {
        self.handler_options
    }
}

fn rpc_url_from_env() -> IndexerResult<Option<String>> {
    if let Ok(url) = env::var("RPC_URL") {
        if !url.is_empty() {
            return Ok(Some(url));
        }
    }

    let Ok(key) = env::var("ALCHEMY_API_KEY") else {
        return Ok(None);
    };

    if key.is_empty() || key == ALCHEMY_PLACEHOLDER {
        return Err(IndexerError::config(
            "ALCHEMY_API_KEY must be set to a valid Alchemy API key",
            None,
        ));
    }

    Ok(Some(format!("https://eth-mainnet.g.alchemy.com/v2/{key}")))
}

fn parse_var<T>(name: &str, default: T) -> IndexerResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            IndexerError::config(format!("{name} has invalid value '{raw}'"), Some(Box::new(e)))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_address(raw: &str) -> IndexerResult<Address> {
    // Basic shape check before hex parsing, for a clearer message
    if !raw.starts_with("0x") || raw.len() != 42 {
        return Err(IndexerError::config(
            format!(
                "FACTORY_ADDRESS must be a valid Ethereum address (0x + 40 hex chars), got: {raw}"
            ),
            None,
        ));
    }

    raw.parse::<Address>().map_err(|e| {
        IndexerError::config(
            format!("FACTORY_ADDRESS is not valid hex: {raw}"),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 9] = [
        "RPC_URL",
        "ALCHEMY_API_KEY",
        "DATABASE_URL",
        "FACTORY_ADDRESS",
        "START_BLOCK",
        "BATCH_SIZE",
        "POLL_INTERVAL_SECS",
        "SKIP_EXISTING_PAIRS",
        "ATOMIC_FACTORY_COUNT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_config_loads_without_rpc_source() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url(), "sqlite:./factory.db");
        assert!(matches!(
            config.rpc_url(),
            Err(IndexerError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_config_validation_placeholder_api_key() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("ALCHEMY_API_KEY", "your_alchemy_api_key_here");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_config_rpc_url_construction() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("ALCHEMY_API_KEY", "test_api_key");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.rpc_url().unwrap(),
            "https://eth-mainnet.g.alchemy.com/v2/test_api_key"
        );

        clear_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");

        let config = Config::from_env().unwrap();
        assert_eq!(config.rpc_url().unwrap(), "http://localhost:8545");
        assert_eq!(config.database_url(), "sqlite:./factory.db");
        assert_eq!(config.factory_address(), UNISWAP_V2_FACTORY);
        assert_eq!(config.start_block(), 10_000_834);
        assert_eq!(config.batch_size(), 1000);
        assert_eq!(config.poll_interval_secs(), 12);
        assert_eq!(config.handler_options(), HandlerOptions::default());

        clear_env();
    }

    #[test]
    fn test_config_handler_options() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("SKIP_EXISTING_PAIRS", "true");
        env::set_var("ATOMIC_FACTORY_COUNT", "true");

        let options = Config::from_env().unwrap().handler_options();
        assert!(options.skip_existing_pairs);
        assert!(options.atomic_factory_count);

        env::set_var("SKIP_EXISTING_PAIRS", "yes");
        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_config_validation_invalid_factory_address() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");

        env::set_var("FACTORY_ADDRESS", "invalid_address");
        assert!(Config::from_env().is_err());

        env::set_var("FACTORY_ADDRESS", "0xzz69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");
        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_config_rejects_zero_batch_size() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("BATCH_SIZE", "0");

        assert!(Config::from_env().is_err());

        clear_env();
    }
}
