//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing` macros with key-value
//! fields (`block_number`, `pair`, `token`, ...). This module installs the
//! subscriber that renders them.
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=uniswap_factory_sync=debug,sqlx=warn uniswap-factory-sync sync
//!
//! # JSON console output for log aggregation
//! LOG_JSON=true uniswap-factory-sync watch
//!
//! # Additionally write JSON logs to a daily-rotated file
//! LOG_FILE=./logs/indexer.log uniswap-factory-sync watch
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter applied when neither `RUST_LOG` nor an explicit level is given:
/// info for this crate, warn for dependencies.
pub const DEFAULT_FILTER: &str = "uniswap_factory_sync=info,warn";

/// Logging settings, usually read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Level or filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// File receiving JSON logs, rotated daily.
    pub file: Option<PathBuf>,
    /// JSON instead of pretty console output.
    pub json: bool,
}

impl LogSettings {
    /// Settings from `LOG_FILE` and `LOG_JSON`.
    #[must_use]
    pub fn from_env() -> Self {
        let file = std::env::var("LOG_FILE")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let json = std::env::var("LOG_JSON")
            .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
            .unwrap_or(false);

        Self {
            level: None,
            file,
            json,
        }
    }

    /// Filter directive to use: `RUST_LOG`, then `level`, then [`DEFAULT_FILTER`].
    #[must_use]
    pub fn filter_directive(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .or_else(|| self.level.clone())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
    }
}

/// Install the global tracing subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process. It is `None` without file logging.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    settings: &LogSettings,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::new(settings.filter_directive());

    let console_layer = if settings.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;

            let file_appender = tracing_appender::rolling::daily(
                directory,
                path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // File output is always JSON
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output = settings.json,
        file_logging = settings.file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

/// Test subscriber writing through the test harness.
///
/// Safe to call from many tests; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("uniswap_factory_sync=debug"))
        .try_init();
}
