//! CLI entry point for the Uniswap V2 factory indexer.
//!
//! ```text
//! main.rs        tracing + runtime
//!     ↓
//! cli.rs         command dispatch, output
//!     ↓
//! indexer.rs     block batches → ordered PairCreated events
//!     ↓
//! handler.rs     factory / tokens / validation / commit
//!     ↓
//! db/            SQLite entity store, tracked pairs, cursor
//! ```

use uniswap_factory_sync::{cli, observability};
use tracing::error;

#[tokio::main]
async fn main() {
    // RUST_LOG, LOG_JSON and LOG_FILE control the output
    let settings = observability::LogSettings::from_env();
    let _guard = match observability::init_tracing(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
