//! # PlexNotify: request status notifier
//!
//! Polls a Notion request board and emails requesters once when their
//! request is done or could not be found.
//!
//! Usage:
//!   plexnotify run                 # Reconcile on the configured interval
//!   plexnotify once --dry-run      # One run, no writes, no emails
//!   plexnotify list                # Show tracked requests
//!   plexnotify init                # Write a default config file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plexnotify_core::PlexNotifyConfig;
use plexnotify_core::traits::StateStore;
use plexnotify_notifier::EmailNotifier;
use plexnotify_notion::NotionClient;
use plexnotify_scheduler::{Reconciler, RunOutcome, run_loop};
use plexnotify_store::SqliteStateStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "plexnotify",
    version,
    about = "📬 PlexNotify — emails requesters when their Plex request is ready"
)]
struct Cli {
    /// Config file (default: ~/.plexnotify/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile on the configured interval until Ctrl-C
    Run,
    /// Reconcile once and print a summary
    Once {
        /// Read only: no store writes, no emails
        #[arg(long)]
        dry_run: bool,
    },
    /// List tracked requests and their last seen status
    List,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PlexNotifyConfig> {
    let mut config = match path {
        Some(p) => PlexNotifyConfig::load_from(p)?,
        None => PlexNotifyConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

/// Open the status store. Read-only commands never create or migrate it.
fn open_store(config: &PlexNotifyConfig, read_only: bool) -> Result<(PathBuf, Arc<SqliteStateStore>)> {
    let path = config.store.resolved_path();
    let store = if read_only {
        SqliteStateStore::open_read_only(&path)?
    } else {
        SqliteStateStore::open(&path)?
    };
    Ok((path, Arc::new(store)))
}

fn build_reconciler(config: &PlexNotifyConfig, store: Arc<SqliteStateStore>) -> Reconciler {
    Reconciler::new(
        Arc::new(NotionClient::new(&config.notion)),
        store,
        Arc::new(EmailNotifier::new(&config.notifier)),
        config.statuses.vocabulary(),
    )
    .with_lease_ttl(Duration::from_secs(config.scheduler.lease_ttl_secs))
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(PlexNotifyConfig::default_path);
    if path.exists() && !force {
        println!("⚠️  {} already exists (use --force to overwrite).", path.display());
        return Ok(());
    }
    PlexNotifyConfig::default().save_to(&path)?;
    println!("✅ Wrote default config to {}", path.display());
    println!("   Set notion.integration_key and notion.database_id, or export");
    println!("   NOTION_INTEGRATION_KEY and NOTION_PLEX_REQUEST_DATABASE_ID.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "plexnotify=debug" } else { "plexnotify=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.command {
        Command::Init { force } => init_config(cli.config, force)?,
        Command::List => {
            let config = load_config(cli.config.as_ref())?;
            let (store_path, store) = open_store(&config, true)?;
            let entries = store.entries().await?;
            if entries.is_empty() {
                println!("No tracked requests in {}", store_path.display());
            }
            for entry in entries {
                println!(
                    "{:<14} {}  ({})",
                    entry.status,
                    entry.key,
                    entry.updated_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        Command::Once { dry_run } => {
            let config = load_config(cli.config.as_ref())?;
            config.validate()?;
            let (_, store) = open_store(&config, dry_run)?;
            let reconciler = build_reconciler(&config, store).with_dry_run(dry_run);
            match reconciler.run().await? {
                RunOutcome::Completed(report) => {
                    println!("{}", report.summary());
                    for (record, failure) in report.failures() {
                        println!("   ❌ {}: {}", record.title, failure);
                    }
                    if report.failed() > 0 {
                        anyhow::bail!("{} record(s) failed", report.failed());
                    }
                }
                RunOutcome::Skipped => println!("⏭️  Another run is in progress, skipped."),
            }
        }
        Command::Run => {
            let config = load_config(cli.config.as_ref())?;
            config.validate()?;
            let (store_path, store) = open_store(&config, false)?;
            println!("📬 PlexNotify v{}", env!("CARGO_PKG_VERSION"));
            println!("   🗄️  Store:    {}", store_path.display());
            println!("   📡 Notion DB: {}", config.notion.database_id);
            println!("   📧 Delivery: {}", config.notifier.endpoint);
            println!("   ⏰ Interval: {}s", config.scheduler.interval_secs);
            println!();

            let reconciler = Arc::new(build_reconciler(&config, store));
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            run_loop(
                reconciler,
                Duration::from_secs(config.scheduler.interval_secs),
                shutdown,
            )
            .await;
        }
    }

    Ok(())
}
