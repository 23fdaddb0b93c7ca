//! Main entry point for the coordinator binary
//!
//! Wires the production services together and hands them to the coordinator.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::signal;

use coordinator::{
    services::{DedupStore, KeyFileSecretStore, SpoolDirJobQueue, TcpEventSource},
    Coordinator, CoordinatorResult, Dispatcher, RuleSet,
};
use shared::{logging, DispatchStatus};
use tracing::info;

/// Cross-telescope trigger coordinator
#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Dispatches follow-up observation triggers from a telescope pointing feed")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the pointing feed and dispatch follow-up triggers
    Run {
        /// Restrict the active rule set to a single configured alias
        #[arg(long)]
        alias: Option<String>,

        /// Rule configuration file
        #[arg(long, default_value = "trigger_rules.json")]
        config: PathBuf,

        /// Dedup store directory
        #[arg(long, default_value = "trigger_records.db")]
        db: PathBuf,

        /// Spool directory where dispatch jobs are handed to the worker
        #[arg(long, default_value = "spool")]
        spool_dir: PathBuf,

        /// Event feed address (host:port)
        #[arg(long, default_value = "127.0.0.1:4062")]
        feed_addr: String,

        /// Secret key file (defaults to the user config directory)
        #[arg(long)]
        keys: Option<PathBuf>,

        /// Perform all matching and dedup bookkeeping but submit nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print dispatch history from the dedup store
    Status {
        /// Dedup store directory
        #[arg(long, default_value = "trigger_records.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> CoordinatorResult<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    match args.command {
        Command::Run {
            alias,
            config,
            db,
            spool_dir,
            feed_addr,
            keys,
            dry_run,
        } => run(alias, &config, &db, spool_dir, feed_addr, keys, dry_run).await,
        Command::Status { db } => status(&db),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    alias: Option<String>,
    config: &Path,
    db: &Path,
    spool_dir: PathBuf,
    feed_addr: String,
    keys: Option<PathBuf>,
    dry_run: bool,
) -> CoordinatorResult<()> {
    logging::log_startup("trigger coordinator");

    let mut rules = RuleSet::load(config)?;
    if let Some(alias) = &alias {
        rules = rules.select_alias(alias)?;
        info!("Running single alias {}", alias);
    }
    if dry_run {
        info!("🔎 Dry-run mode: no jobs will be submitted");
    }

    // Initialize services
    let store = DedupStore::open(db)?;
    let queue = SpoolDirJobQueue::new(spool_dir);
    let secrets = KeyFileSecretStore::new(
        keys.unwrap_or_else(KeyFileSecretStore::default_path),
    );
    let event_source = TcpEventSource::new(feed_addr);

    // Assemble the coordinator with dependency injection
    let dispatcher = Dispatcher::new(store, queue, secrets, dry_run);
    let mut coordinator = Coordinator::new(rules, event_source, dispatcher);

    coordinator.initialize().await?;

    // Graceful shutdown on ctrl-c
    let shutdown_sender = coordinator.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_sender.send(()).await;
            }
            Err(err) => {
                logging::log_error("Signal handling", &err);
            }
        }
    });

    coordinator.run().await?;

    logging::log_success("Coordinator stopped gracefully");
    Ok(())
}

fn status(db: &Path) -> CoordinatorResult<()> {
    let store = DedupStore::open(db)?;
    let records = store.records()?;

    if records.is_empty() {
        println!("no dispatch records");
        return Ok(());
    }

    for (key, record) in &records {
        let mut line = format!("{key}  {}", record.status);
        if let Some(job_reference) = &record.job_reference {
            line.push_str(&format!("  job={job_reference}"));
        }
        if let Some(submitted_at) = &record.submitted_at {
            line.push_str(&format!("  submitted={submitted_at}"));
        }
        if let Some(error_detail) = &record.error_detail {
            line.push_str(&format!("  error={error_detail}"));
        }
        println!("{line}");
    }

    let pending = records
        .iter()
        .filter(|(_, record)| record.status == DispatchStatus::Pending)
        .count();
    if pending > 0 {
        println!("\n⚠️ {pending} record(s) stuck in pending; earlier run stopped uncleanly?");
    }
    Ok(())
}
