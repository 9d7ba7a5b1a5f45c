//! Jobtrawl main entry point
//!
//! This is the command-line interface for the Jobtrawl job-posting crawler.

use clap::{Parser, Subcommand, ValueEnum};
use jobtrawl::config::{load_config, Config};
use jobtrawl::crawler::{build_http_client, CircuitBreaker, DiscoveryLoop, ExtractionPool};
use jobtrawl::events::{EventSink, FanoutSink, SqliteEventSink, TracingSink};
use jobtrawl::output::{
    load_statistics, print_discovery_report, print_extraction_report, print_statistics,
};
use jobtrawl::storage::{open_storage, share, SharedStore, SqliteStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Jobtrawl: a resilient job-posting crawler
///
/// Jobtrawl pages through a job listing endpoint to queue posting
/// identifiers, then fetches and parses each posting with a bounded pool of
/// workers. Consecutive rate limiting, missing pages, or empty responses trip
/// a circuit breaker that stops the run cleanly.
#[derive(Parser, Debug)]
#[command(name = "jobtrawl")]
#[command(version = "1.0.0")]
#[command(about = "A resilient job-posting crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (environment variables override it)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page through the listing endpoint and queue new identifiers
    Discover,

    /// Fetch and parse every pending job
    Extract {
        /// Process pending jobs from every location, not just the configured one
        #[arg(long)]
        all_origins: bool,
    },

    /// Run discovery, then extraction
    Run,

    /// Show queue statistics from the database and exit
    Stats {
        /// Also list this many recent database events
        #[arg(long, default_value_t = 0)]
        events: usize,
    },

    /// Validate configuration and show the effective settings
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.log_format);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => {
            tracing::info!(
                "Configuration loaded (location {:?}, {} workers)",
                config.target.location,
                config.extraction.workers
            );
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Check => handle_check(&config),
        Command::Stats { events } => handle_stats(&config, events),
        Command::Discover => {
            let (store, events, stop) = prepare(&config)?;
            handle_discover(&config, store, events, stop).await
        }
        Command::Extract { all_origins } => {
            let (store, events, stop) = prepare(&config)?;
            handle_extract(&config, store, events, stop, all_origins).await
        }
        Command::Run => {
            let (store, events, stop) = prepare(&config)?;
            handle_discover(&config, store.clone(), events.clone(), stop.clone()).await?;
            if stop.is_cancelled() {
                tracing::warn!("Interrupted, skipping extraction");
                return Ok(());
            }
            handle_extract(&config, store, events, stop, false).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, format: LogFormat) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("jobtrawl=info,warn"),
            1 => EnvFilter::new("jobtrawl=debug,info"),
            2 => EnvFilter::new("jobtrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().with_current_span(false).init(),
    }
}

/// Opens the record store, builds the event sinks, and wires Ctrl-C to a stop signal
fn prepare(
    config: &Config,
) -> Result<
    (
        SharedStore<SqliteStorage>,
        Arc<dyn EventSink>,
        CancellationToken,
    ),
    Box<dyn std::error::Error>,
> {
    let path = config.storage.database_path()?;
    tracing::info!("Opening database: {}", path.display());
    let store = share(open_storage(path)?);

    let mut sinks = FanoutSink::new().with_sink(Arc::new(TracingSink));
    if config.events.enabled {
        sinks = sinks.with_sink(Arc::new(SqliteEventSink::new(
            store.clone(),
            config.process_name(),
            config.events.log_discovery_details,
        )));
    }

    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            interrupt.cancel();
        }
    });

    Ok((store, Arc::new(sinks), stop))
}

async fn handle_discover(
    config: &Config,
    store: SharedStore<SqliteStorage>,
    events: Arc<dyn EventSink>,
    stop: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_http_client(&config.http)?;
    let breaker = Arc::new(CircuitBreaker::with_token(
        config.thresholds,
        stop.child_token(),
    ));

    let report = DiscoveryLoop::new(config, client, store, events)?
        .with_breaker(breaker)
        .run()
        .await?;

    print_discovery_report(&report);
    Ok(())
}

async fn handle_extract(
    config: &Config,
    store: SharedStore<SqliteStorage>,
    events: Arc<dyn EventSink>,
    stop: CancellationToken,
    all_origins: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_http_client(&config.http)?;
    let breaker = Arc::new(CircuitBreaker::with_token(
        config.thresholds,
        stop.child_token(),
    ));

    let mut pool = ExtractionPool::new(config, client, store, events)?.with_breaker(breaker);
    if all_origins {
        pool = pool.with_origin(None);
    }

    let report = pool.run().await?;
    print_extraction_report(&report);
    Ok(())
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config, recent_events: usize) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.storage.database_path()?;
    println!("Database: {}\n", path.display());

    let storage = open_storage(path)?;

    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    if recent_events > 0 {
        println!("\nRecent Events:");
        for event in storage.recent_events(recent_events)? {
            println!(
                "  [{}] {} {} ({} records, {:.1}s){}",
                event.created_at,
                event.process_name,
                event.event_type,
                event.records_count,
                event.execution_time_seconds,
                event
                    .error_message
                    .as_deref()
                    .map(|e| format!(" - {}", e))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Handles the check command: prints the effective configuration
fn handle_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Jobtrawl Configuration ===\n");

    println!("Target:");
    println!("  Location: {}", config.target.location);
    println!("  Recency: {}", config.target.recency);
    println!("  Listing URL: {}", config.target.listing_url);
    println!("  Detail URL: {}", config.target.detail_url);
    println!("  Identifier pattern: {}", config.target.id_pattern);

    println!("\nDiscovery:");
    println!("  Max retries: {}", config.discovery.max_retries);
    println!("  Retry delay: {}ms", config.discovery.retry_delay_ms);

    println!("\nExtraction:");
    println!("  Workers: {}", config.extraction.workers);
    println!("  Max retries: {}", config.extraction.max_retries);
    println!("  Retry delay: {}ms", config.extraction.retry_delay_ms);
    println!("  Breaker scope: {:?}", config.extraction.breaker_scope);

    println!("\nThresholds:");
    println!("  Consecutive 429: {}", config.thresholds.rate_limited);
    println!("  Consecutive 404: {}", config.thresholds.not_found);
    println!("  Consecutive empty: {}", config.thresholds.empty_body);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path()?.display());
    println!(
        "  Event log: {} (process {})",
        if config.events.enabled { "enabled" } else { "disabled" },
        config.process_name()
    );

    println!("\n✓ Configuration is valid");
    Ok(())
}
