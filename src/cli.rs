//! Command-line interface for the factory indexer.
//!
//! # Commands
//!
//! - `sync`: Index a block range once
//! - `watch`: Follow the chain head until interrupted
//! - `factory`: Show the factory, bundle and sync cursor
//! - `token <address>`: Show one indexed token
//! - `pair <address>`: Show one indexed pair
//! - `pairs`: List indexed pairs
//!
//! # Example
//!
//! ```bash
//! # Index the first pairs ever created
//! uniswap-factory-sync sync --from 10000834 --to 10010000
//!
//! # Keep up with the chain
//! uniswap-factory-sync watch --interval 12
//! ```

use crate::config::Config;
use crate::db::{create_pool, repository::Repository};
use crate::entities::{entity_id, Bundle, EntityKind, Factory, Pair, Token, BUNDLE_ID};
use crate::error::{IndexerError, IndexerResult};
use crate::handler::PairCreatedHandler;
use crate::indexer::{Indexer, SyncReport};
use crate::metadata::RpcMetadataResolver;
use crate::registrar::StoredPairRegistrar;
use crate::rpc::create_provider;
use crate::store::EntityStoreExt;
use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

type ChainIndexer = Indexer<Repository, RpcMetadataResolver, StoredPairRegistrar>;

/// Uniswap V2 factory indexer
#[derive(Parser, Debug)]
#[command(name = "uniswap-factory-sync")]
#[command(about = "Indexes Uniswap V2 PairCreated events into factory, token and pair entities", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a block range once
    Sync {
        /// First block (default: block after the stored cursor, or START_BLOCK)
        #[arg(short, long)]
        from: Option<u64>,

        /// Last block (default: latest block)
        #[arg(short, long)]
        to: Option<u64>,
    },

    /// Follow the chain head until Ctrl-C
    Watch {
        /// Polling interval in seconds (default: POLL_INTERVAL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show the factory, bundle and sync cursor
    Factory,

    /// Show one indexed token
    Token {
        /// Token contract address
        address: String,
    },

    /// Show one indexed pair
    Pair {
        /// Pair contract address
        address: String,
    },

    /// List indexed pairs
    Pairs {
        /// Maximum number of pairs to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if configuration loading, database access or an RPC
/// call fails.
pub async fn run() -> IndexerResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Sync { from, to } => run_sync_command(&config, from, to).await,
        Commands::Watch { interval } => {
            let interval = interval.unwrap_or_else(|| config.poll_interval_secs());
            run_watch_command(&config, interval).await
        }
        Commands::Factory => run_factory_command(&config).await,
        Commands::Token { address } => run_token_command(&config, &address).await,
        Commands::Pair { address } => run_pair_command(&config, &address).await,
        Commands::Pairs { limit } => run_pairs_command(&config, limit).await,
    }
}

async fn open_repository(config: &Config) -> IndexerResult<Repository> {
    let pool = create_pool(config.database_url()).await?;
    Ok(Repository::new(pool))
}

async fn build_indexer(config: &Config) -> IndexerResult<ChainIndexer> {
    let provider = create_provider(config.rpc_url()?).await?;
    let repository = open_repository(config).await?;

    let handler = PairCreatedHandler::new(
        entity_id(&config.factory_address()),
        repository.clone(),
        RpcMetadataResolver::new(provider.clone()),
        StoredPairRegistrar::new(repository.clone()),
        config.handler_options(),
    );

    Ok(Indexer::new(
        provider,
        repository,
        handler,
        config.factory_address(),
        config.batch_size(),
    ))
}

/// Execute the sync command (one range).
async fn run_sync_command(config: &Config, from: Option<u64>, to: Option<u64>) -> IndexerResult<()> {
    let mut indexer = build_indexer(config).await?;

    let from_block = match from {
        Some(block) => block,
        None => indexer.resume_block(config.start_block()).await?,
    };
    let to_block = match to {
        Some(block) => block,
        None => indexer.latest_block().await?,
    };

    if from_block > to_block {
        println!(
            "{} Nothing to sync: block {} is past {}",
            "ℹ️".cyan(),
            from_block,
            to_block
        );
        return Ok(());
    }

    info!(from_block, to_block, "Starting sync");
    println!(
        "{} Syncing blocks {} to {}",
        "🔄".cyan(),
        from_block.to_string().yellow(),
        to_block.to_string().yellow()
    );

    let report = indexer.sync_range(from_block, to_block).await?;
    print_report(&report);

    Ok(())
}

/// Execute the watch command (continuous indexing).
async fn run_watch_command(config: &Config, interval: u64) -> IndexerResult<()> {
    info!(interval, "Starting watch mode");
    println!(
        "{}",
        format!("🔍 Watching factory {} for new pairs...", config.factory_address())
            .cyan()
            .bold()
    );
    println!();

    // Setup graceful shutdown handler; a running sync stops at its next batch
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut indexer = build_indexer(config)
        .await?
        .with_shutdown(shutdown_rx.clone());

    loop {
        match indexer.sync_to_head(config.start_block()).await {
            Ok(report) if report.events > 0 => print_report(&report),
            Ok(_) => debug!("No new pairs"),
            Err(e) => {
                // The cursor only moves on success; the next tick retries
                error!(error = %e, "Sync failed");
                println!("{} {}", "⚠️  Error:".red().bold(), e);
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            Ok(()) = shutdown_rx.changed() => break,
            () = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }

    println!();
    println!("{}", "🛑 Shutting down gracefully...".yellow().bold());

    let stats = indexer.handler().stats();
    println!(
        "{} Committed: {} | Aborted: {} | Duplicates: {}",
        "📍".cyan(),
        stats.committed.to_string().green(),
        stats.aborted.to_string().red(),
        stats.duplicates
    );
    println!("{}", "👋 Shutdown complete".green().bold());
    info!("Shutdown complete");

    Ok(())
}

/// Execute the factory command.
async fn run_factory_command(config: &Config) -> IndexerResult<()> {
    let repository = open_repository(config).await?;
    let factory_id = entity_id(&config.factory_address());

    let Some(factory) = repository.load::<Factory>(&factory_id).await? else {
        println!("{} Factory {} not indexed yet", "ℹ️".cyan(), factory_id);
        return Ok(());
    };
    let bundle = repository.load::<Bundle>(BUNDLE_ID).await?;
    let stored_pairs = repository.count_entities(EntityKind::Pair).await?;
    let stored_tokens = repository.count_entities(EntityKind::Token).await?;
    let tracked = repository.get_tracked_pairs().await?.len();
    let state = repository.get_state(&factory_id).await?;

    println!("{} {}", "🏭 Factory".bold(), factory.id.yellow());
    println!("   Pair count:     {}", factory.pair_count.to_string().green());
    println!("   Stored pairs:   {stored_pairs}");
    println!("   Stored tokens:  {stored_tokens}");
    println!("   Tracked pairs:  {tracked}");
    if let Some(bundle) = bundle {
        println!("   ETH price:      {}", bundle.eth_price);
    }
    if let Some(state) = state {
        println!(
            "   Last block:     {} ({} events processed)",
            state.last_block().to_string().yellow(),
            state.total_events_processed
        );
    }

    Ok(())
}

/// Execute the token command.
async fn run_token_command(config: &Config, address: &str) -> IndexerResult<()> {
    let address = parse_address(address)?;
    let repository = open_repository(config).await?;

    match repository.load::<Token>(&entity_id(&address)).await? {
        Some(token) => print_token(&token),
        None => println!("{} Token {} not indexed", "ℹ️".cyan(), address),
    }

    Ok(())
}

/// Execute the pair command.
async fn run_pair_command(config: &Config, address: &str) -> IndexerResult<()> {
    let address = parse_address(address)?;
    let repository = open_repository(config).await?;

    let Some(pair) = repository.load::<Pair>(&entity_id(&address)).await? else {
        println!("{} Pair {} not indexed", "ℹ️".cyan(), address);
        return Ok(());
    };

    let token0 = repository.load::<Token>(&pair.token0).await?;
    let token1 = repository.load::<Token>(&pair.token1).await?;
    print_pair(&pair, token0.as_ref(), token1.as_ref());

    Ok(())
}

/// Execute the pairs command.
async fn run_pairs_command(config: &Config, limit: usize) -> IndexerResult<()> {
    let repository = open_repository(config).await?;

    let mut pairs = repository
        .list_records(EntityKind::Pair)
        .await?
        .into_iter()
        .map(crate::store::EntityRecord::decode::<Pair>)
        .collect::<IndexerResult<Vec<_>>>()?;
    pairs.sort_by_key(|pair| pair.created_at_block_number);

    println!("{} {} pairs indexed", "📊".cyan(), pairs.len());
    for pair in pairs.iter().take(limit) {
        println!(
            "   {} block {} | {} / {}",
            pair.id.yellow(),
            pair.created_at_block_number,
            pair.token0.dimmed(),
            pair.token1.dimmed()
        );
    }

    Ok(())
}

fn parse_address(raw: &str) -> IndexerResult<Address> {
    raw.parse::<Address>().map_err(|e| {
        IndexerError::config(format!("Invalid address '{raw}'"), Some(Box::new(e)))
    })
}

fn print_report(report: &SyncReport) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    println!(
        "{} {} Blocks {}..={} | Events: {} | Committed: {} | Aborted: {} | Duplicates: {}",
        "📦".cyan(),
        timestamp.to_string().dimmed(),
        report.from_block.to_string().yellow(),
        report.to_block.to_string().yellow(),
        report.events,
        report.committed.to_string().green(),
        report.aborted.to_string().red(),
        report.duplicates
    );
    if report.undecodable > 0 {
        println!(
            "{} {} logs could not be decoded",
            "⚠️".yellow(),
            report.undecodable
        );
    }
}

fn print_token(token: &Token) {
    let decimals = token
        .decimals
        .map_or_else(|| "unresolved".red().to_string(), |d| d.to_string());

    println!("{} {} ({})", "🪙 Token".bold(), token.symbol.green(), token.name);
    println!("   Address:        {}", token.id.yellow());
    println!("   Decimals:       {decimals}");
    println!("   Total supply:   {}", token.total_supply);
    println!("   Derived ETH:    {}", token.derived_eth);
}

fn print_pair(pair: &Pair, token0: Option<&Token>, token1: Option<&Token>) {
    let symbol = |token: Option<&Token>| token.map_or("?", |t| t.symbol.as_str()).to_string();
    let created = i64::try_from(pair.created_at_timestamp)
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map_or_else(|| pair.created_at_timestamp.to_string(), |dt| dt.to_rfc3339());

    println!(
        "{} {}/{}",
        "🔗 Pair".bold(),
        symbol(token0).green(),
        symbol(token1).green()
    );
    println!("   Address:        {}", pair.id.yellow());
    println!("   Token0:         {}", pair.token0);
    println!("   Token1:         {}", pair.token1);
    println!("   Created block:  {}", pair.created_at_block_number);
    println!("   Created at:     {created}");
}
