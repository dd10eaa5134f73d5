//! Command-line entry point

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stillharvest::config::load_config_with_hash;
use stillharvest::crawler::stop_channel;
use stillharvest::output::print_store_statistics;
use stillharvest::{open_store, Config, Orchestrator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stillharvest",
    version,
    about = "Harvests image records from a paginated gallery site"
)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print store statistics and exit
    #[arg(long)]
    stats: bool,

    /// Validate the configuration and exit without harvesting
    #[arg(long)]
    dry_run: bool,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "stillharvest=error"
    } else {
        match verbose {
            0 => "stillharvest=info",
            1 => "stillharvest=debug",
            _ => "stillharvest=trace,debug",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_dry_run(config: &Config, hash: &str) {
    println!("Configuration OK ({})", hash);
    println!("  Source:        {}", config.source.base_url);
    println!("  Browse path:   {}", config.source.browse_path);
    println!(
        "  Pool:          {} sessions x {} pages",
        config.harvester.pool_size, config.harvester.pages_per_session
    );
    println!(
        "  Rate limit:    {} req/min, backoff x{}",
        config.rate_limit.max_requests_per_minute, config.rate_limit.backoff_factor
    );
    match config.harvester.max_pages {
        Some(max) => println!("  Page limit:    {}", max),
        None => println!("  Page limit:    none"),
    }
    if config.downloads.enabled {
        println!(
            "  Downloads:     {} concurrent into {}",
            config.downloads.concurrent_downloads, config.downloads.directory
        );
    } else {
        println!("  Downloads:     disabled");
    }
    println!("  Store:         {}", config.storage.database_url);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    if cli.dry_run {
        print_dry_run(&config, &config_hash);
        return Ok(());
    }

    let store = open_store(&config.storage.database_url).context("Failed to open record store")?;

    if cli.stats {
        let stats = store.stats().context("Failed to read store statistics")?;
        print_store_statistics(&stats);
        return Ok(());
    }

    info!(config_hash = %config_hash, source = %config.source.base_url, "Starting harvest");

    let (stop_handle, stop) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current work");
            stop_handle.stop();
        }
    });

    let mut orchestrator = Orchestrator::new(Arc::new(config), store, stop)
        .context("Failed to initialize harvester")?;
    orchestrator.run().await.context("Harvest failed")?;

    Ok(())
}
