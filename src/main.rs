//! Spider-Pool main entry point
//!
//! This is the command-line interface for the Spider-Pool fetch engine.

use anyhow::{bail, Context, Result};
use clap::Parser;
use spider_pool::config::{load_config_with_hash, validate, Config};
use spider_pool::crawler::{Coordinator, LoggingCallback, Strategy};
use spider_pool::output::print_statistics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Spider-Pool: a bounded-concurrency HTTP fetch engine
///
/// Spider-Pool fetches a list of URLs while never keeping more than a fixed
/// number of requests in flight, and reports how long the whole run took.
#[derive(Parser, Debug)]
#[command(name = "spider-pool")]
#[command(version)]
#[command(about = "A bounded-concurrency HTTP fetch engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// URL to fetch (repeatable, appended to the configured list)
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// File with one URL per line; blank lines and '#' comments are skipped
    #[arg(long, value_name = "PATH")]
    urls_file: Option<PathBuf>,

    /// Maximum number of requests in flight
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Completion draining strategy (eager or wave)
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Wave poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Number of times the URL list is repeated
    #[arg(long)]
    repeat: Option<usize>,

    /// Total connection limit of the transport
    #[arg(long)]
    max_connections: Option<usize>,

    /// Per-host connection limit of the transport
    #[arg(long)]
    max_connections_per_host: Option<usize>,

    /// Validate config and show what would be fetched without fetching
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let urls = config.input.expanded_urls();
    if urls.is_empty() {
        bail!("no URLs to fetch: pass --url, --urls-file or list them under [input] in the config");
    }

    if cli.dry_run {
        handle_dry_run(&config, &urls);
        return Ok(());
    }

    handle_fetch(config, urls).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spider_pool=info,warn"),
            1 => EnvFilter::new("spider_pool=debug,info"),
            2 => EnvFilter::new("spider_pool=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(concurrency) = cli.concurrency {
        config.engine.concurrency = concurrency;
    }
    if let Some(strategy) = cli.strategy {
        config.engine.strategy = strategy;
    }
    if let Some(poll_interval_ms) = cli.poll_interval_ms {
        config.engine.poll_interval_ms = poll_interval_ms;
    }
    if let Some(repeat) = cli.repeat {
        config.input.repeat = repeat;
    }
    if let Some(max_connections) = cli.max_connections {
        config.transport.max_connections = max_connections;
    }
    if let Some(per_host) = cli.max_connections_per_host {
        config.transport.max_connections_per_host = per_host;
    }

    config.input.urls.extend(cli.urls.iter().cloned());
    if let Some(path) = &cli.urls_file {
        config.input.urls.extend(read_urls_file(path)?);
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Reads one URL per line, skipping blank lines and `#` comments
fn read_urls_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Handles the --dry-run mode: shows the effective settings and URL list
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== Spider-Pool Dry Run ===\n");

    println!("Engine:");
    println!("  Concurrency: {}", config.engine.concurrency);
    println!("  Strategy: {}", config.engine.strategy);
    if config.engine.strategy == Strategy::Wave {
        println!("  Poll interval: {}ms", config.engine.poll_interval_ms);
    }

    println!("\nTransport:");
    println!("  Max connections: {}", config.transport.max_connections);
    println!(
        "  Max connections per host: {}",
        config.transport.max_connections_per_host
    );
    println!("  Request timeout: {}s", config.transport.request_timeout_secs);
    println!("  Connect timeout: {}s", config.transport.connect_timeout_secs);
    println!("  User agent: {}", config.transport.user_agent);

    println!(
        "\nURLs ({} listed, repeated {}x):",
        config.input.urls.len(),
        config.input.repeat
    );
    for url in &config.input.urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would fetch {} URLs", urls.len());
}

/// Handles the main fetch run
async fn handle_fetch(config: Config, urls: Vec<String>) -> Result<()> {
    tracing::info!(
        "Fetching {} URLs with concurrency {} ({} strategy)",
        urls.len(),
        config.engine.concurrency,
        config.engine.strategy
    );

    let coordinator = Coordinator::from_config(&config, Arc::new(LoggingCallback))
        .context("failed to set up the fetch engine")?;

    let abort = coordinator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping admission");
            abort.abort();
        }
    });

    let report = coordinator.run(urls).await.context("fetch run failed")?;
    print_statistics(&report);

    if report.aborted {
        tracing::warn!(
            "Run aborted: {} abandoned, {} never admitted",
            report.abandoned,
            report.never_admitted
        );
    }

    Ok(())
}
