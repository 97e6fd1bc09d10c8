//! Siteprobe main entry point
//!
//! This is the command-line interface for the Siteprobe crawl task engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use siteprobe::config::{load_config_or_default, Config};
use siteprobe::crawler::{Orchestrator, StartOutcome, StopOutcome};
use siteprobe::output::{
    load_resource_report, load_statistics, print_resource_list, print_resource_report,
    print_statistics,
};
use siteprobe::storage::{open_storage, SharedStorage, SqliteStorage, Storage};
use siteprobe::url::normalize_url;
use siteprobe::ResourceId;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Siteprobe: crawl tracked pages and check their links
///
/// Each tracked page is fetched once per crawl; its markup version, title,
/// headings and links are stored, and every link is checked for reachability.
#[derive(Parser, Debug)]
#[command(name = "siteprobe")]
#[command(version)]
#[command(about = "Crawl tracked pages and check their links", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track a new page
    Add {
        /// Page address; `http://` is assumed when no scheme is given
        address: String,

        /// Owning user id
        #[arg(long, default_value_t = 1)]
        user: i64,
    },

    /// List tracked pages
    List,

    /// Show stored results for one page
    Show { id: ResourceId },

    /// Show resource counts by status
    Stats,

    /// Crawl pages and wait for the tasks to finish (Ctrl-C stops them)
    Crawl {
        #[arg(required = true)]
        ids: Vec<ResourceId>,

        /// First mark pages left `processing` by an earlier run as failed
        ///
        /// Only safe when no other siteprobe process uses the same database.
        #[arg(long)]
        recover: bool,
    },

    /// Delete a page and its stored results
    Delete { id: ResourceId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "invalid default configuration".to_string(),
    })?;
    tracing::debug!("Using database {}", config.storage.database_path);

    match cli.command {
        Command::Add { address, user } => handle_add(&config, &address, user),
        Command::List => handle_list(&config),
        Command::Show { id } => handle_show(&config, id),
        Command::Stats => handle_stats(&config),
        Command::Crawl { ids, recover } => handle_crawl(&config, &ids, recover).await,
        Command::Delete { id } => handle_delete(&config, id),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("siteprobe=info,warn"),
            1 => EnvFilter::new("siteprobe=debug,info"),
            2 => EnvFilter::new("siteprobe=trace,debug"),
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

fn open(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("failed to open database {}", path.display()))
}

fn handle_add(config: &Config, address: &str, user: i64) -> anyhow::Result<()> {
    let url = normalize_url(address)?;
    let mut storage = open(config)?;
    let id = storage.insert_resource(user, url.as_str())?;

    tracing::info!(resource_id = id, "Tracking {}", url);
    println!("{}", id);
    Ok(())
}

fn handle_list(config: &Config) -> anyhow::Result<()> {
    let storage = open(config)?;
    print_resource_list(&storage.list_all_resources()?);
    Ok(())
}

fn handle_show(config: &Config, id: ResourceId) -> anyhow::Result<()> {
    let storage = open(config)?;
    let report = load_resource_report(&storage, id)?;
    print_resource_report(&report);
    Ok(())
}

fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open(config)?;
    println!("Database: {}\n", config.storage.database_path);
    print_statistics(&load_statistics(&storage)?);
    Ok(())
}

fn handle_delete(config: &Config, id: ResourceId) -> anyhow::Result<()> {
    let mut storage = open(config)?;
    storage.delete_resource(id)?;
    println!("Deleted resource {}", id);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, ids: &[ResourceId], recover: bool) -> anyhow::Result<()> {
    let storage = SharedStorage::new(open(config)?);
    let orchestrator = Orchestrator::new(storage, config)?;

    if recover {
        let recovered = orchestrator.recover_interrupted()?;
        if !recovered.is_empty() {
            tracing::warn!("Previous run left {} resources unfinished", recovered.len());
        }
    }

    let outcome = orchestrator.start_batch(ids);
    print_start_outcome(&outcome);
    if outcome.started.is_empty() {
        return Ok(());
    }

    tokio::select! {
        _ = orchestrator.wait_idle() => {
            tracing::info!("All crawl tasks finished");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("Interrupt received, stopping crawl tasks");
            let stopped = orchestrator.stop_all();
            print_stop_outcome(&stopped);
            orchestrator.wait_idle().await;
        }
    }

    for id in &outcome.started {
        let record = orchestrator.storage().with(|s| s.get_resource(*id))?;
        match &record.error_message {
            Some(message) => println!("{}: {} ({})", id, record.status, message),
            None => println!("{}: {}", id, record.status),
        }
    }
    Ok(())
}

fn print_start_outcome(outcome: &StartOutcome) {
    for id in &outcome.started {
        println!("started {}", id);
    }
    for (id, reason) in &outcome.skipped {
        println!("skipped {}: {}", id, reason);
    }
}

fn print_stop_outcome(outcome: &StopOutcome) {
    for id in &outcome.stopped {
        println!("stopped {}", id);
    }
    for (id, reason) in &outcome.skipped {
        println!("skipped {}: {}", id, reason);
    }
}
