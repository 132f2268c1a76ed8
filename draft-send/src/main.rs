//! draft-send - Background daemon for scheduled publishing
//!
//! Polls the schedule ledger and publishes approved drafts when their
//! time arrives. Jobs that overshot their window by more than the expiry
//! horizon are retired instead of published. Every action goes through
//! the same claim as the manual verbs, so running the daemon alongside
//! draft-queue cannot double-publish.

use clap::Parser;
use libdraftgate::config::PublisherConfig;
use libdraftgate::publisher::x::XPublisher;
use libdraftgate::publisher::Publisher;
use libdraftgate::scheduler::NullScheduler;
use libdraftgate::views::{
    ListViewSynchronizer, Notifier, TextNotifier, TextRenderer, ViewRenderer,
};
use libdraftgate::{
    ApprovalRegistry, Config, PublicationCoordinator, RecordStore, Result, ScheduleLedger,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "draft-send")]
#[command(version)]
#[command(about = "Background daemon that publishes due drafts")]
#[command(long_about = "\
draft-send - Background daemon for scheduled publishing

DESCRIPTION:
    draft-send is a long-running daemon that polls for approved drafts
    whose publish time has arrived and posts them. It also expires jobs
    that missed their window (e.g. the daemon was down for a day) and
    keeps open status views in sync after every pass.

USAGE:
    # Run in foreground (logs to stderr)
    draft-send

    # Run with custom poll interval
    draft-send --poll-interval 30

    # Process due drafts once and exit
    draft-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/draftgate/config.toml
    Database location: ~/.local/share/draftgate/drafts.db

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Missing publisher credentials
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_interval: u64,

    /// Expire jobs overdue by more than this many hours instead of
    /// publishing them
    #[arg(long, value_name = "HOURS", default_value_t = 24)]
    expire_after: i64,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    libdraftgate::logging::init("info", cli.verbose);

    let config = Config::load()?;
    let store = Arc::new(RecordStore::new(&config.database.path).await?);
    let registry = ApprovalRegistry::new(Arc::clone(&store));
    let ledger = ScheduleLedger::new(Arc::clone(&store), Arc::new(NullScheduler));

    let publisher_config = config.publisher.clone().unwrap_or(PublisherConfig {
        api_key: None,
        api_secret: None,
        access_token: None,
        access_secret: None,
    });
    let publisher: Arc<dyn Publisher> = Arc::new(XPublisher::from_config(&publisher_config));

    let coordinator = PublicationCoordinator::new(
        Arc::clone(&store),
        registry.clone(),
        ledger.clone(),
        publisher,
        Arc::new(TextNotifier) as Arc<dyn Notifier>,
        config.review.prevent_self_approve,
    );
    let synchronizer = ListViewSynchronizer::new(
        Arc::clone(&store),
        registry,
        ledger,
        Arc::new(TextRenderer) as Arc<dyn ViewRenderer>,
    );

    info!("draft-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let expire_horizon = chrono::Duration::hours(cli.expire_after);
    info!(
        "Poll interval: {}s, expiry horizon: {}h",
        cli.poll_interval, cli.expire_after
    );

    if cli.once {
        run_pass(&coordinator, &synchronizer, expire_horizon).await;
        info!("draft-send: processed drafts once, exiting");
    } else {
        run_daemon_loop(
            &coordinator,
            &synchronizer,
            expire_horizon,
            cli.poll_interval,
            shutdown,
        )
        .await;
    }

    info!("draft-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libdraftgate::DraftgateError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    coordinator: &PublicationCoordinator,
    synchronizer: &ListViewSynchronizer,
    expire_horizon: chrono::Duration,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        run_pass(coordinator, synchronizer, expire_horizon).await;

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// One poll pass: expire stale jobs, publish due jobs, refresh views.
async fn run_pass(
    coordinator: &PublicationCoordinator,
    synchronizer: &ListViewSynchronizer,
    expire_horizon: chrono::Duration,
) {
    let now = chrono::Utc::now();

    match coordinator.sweep_expired(now, expire_horizon).await {
        Ok(0) => {}
        Ok(n) => info!("Expired {} stale job(s)", n),
        Err(e) => error!("Error expiring stale jobs: {}", e),
    }

    match coordinator.process_due(now).await {
        Ok(0) => {}
        Ok(n) => info!("Published {} due draft(s)", n),
        Err(e) => error!("Error publishing due drafts: {}", e),
    }

    if let Err(e) = synchronizer.reconcile().await {
        error!("Error reconciling status views: {}", e);
    }
}
