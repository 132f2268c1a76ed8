//! draft-queue - Manage scheduled drafts
//!
//! Unix-style tool for the post-approval queue: list what is scheduled,
//! cancel, publish early, check an outcome, and keep status views fresh.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use libdraftgate::config::PublisherConfig;
use libdraftgate::publisher::x::XPublisher;
use libdraftgate::publisher::Publisher;
use libdraftgate::scheduler::NullScheduler;
use libdraftgate::views::{
    ListViewSynchronizer, Notifier, TextNotifier, TextRenderer, ViewRenderer,
};
use libdraftgate::{
    ApprovalRegistry, Config, DecisionOutcome, PublicationCoordinator, RecordStore, Result,
    ScheduleLedger, ViewRef,
};

#[derive(Parser, Debug)]
#[command(name = "draft-queue")]
#[command(version)]
#[command(about = "Manage scheduled drafts and status views")]
#[command(long_about = "\
draft-queue - Manage scheduled drafts

DESCRIPTION:
    draft-queue works with drafts that have been approved for a later
    publish time. Cancel one before it fires, publish one early, look up
    how a draft ended, or open and refresh status views.

COMMANDS:
    list        List scheduled drafts
    cancel      Cancel a scheduled draft
    now         Publish a scheduled draft immediately
    status      Show the recorded outcome for a draft
    open-view   Register a status view for a channel location
    sync        Reconcile all live status views once

USAGE EXAMPLES:
    # List everything scheduled
    draft-queue list

    # Cancel before it fires
    draft-queue cancel 3f2a91c0-...

    # Don't wait for the timer
    draft-queue now 3f2a91c0-...

    # How did it end?
    draft-queue status 3f2a91c0-...

    # Track status in a channel and refresh it
    draft-queue open-view --channel C042 --location 1700000000.000100
    draft-queue sync

CONFIGURATION:
    Configuration file: ~/.config/draftgate/config.toml
    Database location: ~/.local/share/draftgate/drafts.db

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Missing publisher credentials
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scheduled drafts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cancel a scheduled draft
    Cancel {
        /// Draft id to cancel
        draft_id: String,
    },

    /// Publish a scheduled draft immediately
    Now {
        /// Draft id to publish
        draft_id: String,
    },

    /// Show the recorded outcome for a draft
    Status {
        /// Draft id to look up
        draft_id: String,
    },

    /// Register a status view
    OpenView {
        /// Channel the view lives in
        #[arg(long)]
        channel: String,

        /// Location within the channel (message id, thread timestamp)
        #[arg(long)]
        location: String,
    },

    /// Reconcile all live status views once
    Sync,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libdraftgate::logging::init("error", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = Arc::new(RecordStore::new(&config.database.path).await?);
    let registry = ApprovalRegistry::new(Arc::clone(&store));
    let ledger = ScheduleLedger::new(Arc::clone(&store), Arc::new(NullScheduler));

    match cli.command {
        Commands::List { format } => list_scheduled(&ledger, &format).await,
        Commands::Cancel { draft_id } => {
            let coordinator = build_coordinator(&config, &store, &registry, &ledger);
            match coordinator.cancel(&draft_id).await? {
                DecisionOutcome::Cancelled => println!("Cancelled {}", draft_id),
                _ => println!("Draft {} was already handled", draft_id),
            }
            Ok(())
        }
        Commands::Now { draft_id } => {
            let coordinator = build_coordinator(&config, &store, &registry, &ledger);
            match coordinator.post_now(&draft_id).await? {
                DecisionOutcome::Published { post_id } => println!("Published: {}", post_id),
                _ => println!("Draft {} was already handled", draft_id),
            }
            Ok(())
        }
        Commands::Status { draft_id } => {
            match store.get_outcome(&draft_id).await? {
                Some(outcome) => {
                    let when = chrono::DateTime::from_timestamp(outcome.recorded_at, 0)
                        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                        .unwrap_or_else(|| outcome.recorded_at.to_string());
                    match outcome.detail {
                        Some(detail) => {
                            println!("{}  ({}, {})", outcome.status, detail, when)
                        }
                        None => println!("{}  ({})", outcome.status, when),
                    }
                }
                None => {
                    // Still pending, still scheduled, or unknown
                    if registry.get(&draft_id).await?.is_some() {
                        println!("pending_approval");
                    } else if ledger.find_by_draft(&draft_id).await?.is_some() {
                        println!("scheduled");
                    } else {
                        println!("unknown draft {}", draft_id);
                    }
                }
            }
            Ok(())
        }
        Commands::OpenView { channel, location } => {
            let sync = build_synchronizer(&store, &registry, &ledger);
            let view = ViewRef::new(channel, location);
            sync.open(&view).await?;
            sync.reconcile().await?;
            println!("View {} registered", view.composite_id());
            Ok(())
        }
        Commands::Sync => {
            let sync = build_synchronizer(&store, &registry, &ledger);
            sync.reconcile().await?;
            Ok(())
        }
    }
}

async fn list_scheduled(ledger: &ScheduleLedger, format: &str) -> Result<()> {
    let mut jobs = ledger.list().await?;
    jobs.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));

    if format == "json" {
        let items: Vec<serde_json::Value> = jobs
            .iter()
            .map(|j| {
                serde_json::json!({
                    "job_id": j.job_id,
                    "draft_id": j.draft.id,
                    "author_id": j.draft.author_id,
                    "text": j.draft.text,
                    "fire_at": j.fire_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default());
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No drafts scheduled.");
        return Ok(());
    }

    for job in jobs {
        let when = chrono::DateTime::from_timestamp(job.fire_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| job.fire_at.to_string());
        println!(
            "{}  @{}  fires {}\n    {}",
            job.draft.id, job.draft.author_id, when, job.draft.text
        );
    }

    Ok(())
}

fn build_coordinator(
    config: &Config,
    store: &Arc<RecordStore>,
    registry: &ApprovalRegistry,
    ledger: &ScheduleLedger,
) -> PublicationCoordinator {
    let publisher_config = config.publisher.clone().unwrap_or(PublisherConfig {
        api_key: None,
        api_secret: None,
        access_token: None,
        access_secret: None,
    });
    let publisher: Arc<dyn Publisher> = Arc::new(XPublisher::from_config(&publisher_config));

    PublicationCoordinator::new(
        Arc::clone(store),
        registry.clone(),
        ledger.clone(),
        publisher,
        Arc::new(TextNotifier) as Arc<dyn Notifier>,
        config.review.prevent_self_approve,
    )
    .with_views(build_synchronizer(store, registry, ledger))
}

fn build_synchronizer(
    store: &Arc<RecordStore>,
    registry: &ApprovalRegistry,
    ledger: &ScheduleLedger,
) -> ListViewSynchronizer {
    ListViewSynchronizer::new(
        Arc::clone(store),
        registry.clone(),
        ledger.clone(),
        Arc::new(TextRenderer) as Arc<dyn ViewRenderer>,
    )
}
