//! draft-submit - Submit a draft for review
//!
//! Unix-style tool that puts a draft into the review queue. The draft
//! stays pending until a reviewer decides it with draft-review.

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use libdraftgate::config::PublisherConfig;
use libdraftgate::publisher::x::XPublisher;
use libdraftgate::publisher::Publisher;
use libdraftgate::scheduler::NullScheduler;
use libdraftgate::views::{
    ListViewSynchronizer, Notifier, TextNotifier, TextRenderer, ViewRenderer,
};
use libdraftgate::{
    ApprovalRegistry, Config, Draft, DraftgateError, PublicationCoordinator, RecordStore, Result,
    ScheduleLedger, ViewRef,
};

#[derive(Parser, Debug)]
#[command(name = "draft-submit")]
#[command(version)]
#[command(about = "Submit a draft for review")]
#[command(long_about = "\
draft-submit - Submit a draft for review

DESCRIPTION:
    draft-submit puts a draft into the review queue. Nothing is published
    until a reviewer approves it with draft-review. A schedule string makes
    the approval publish later instead of immediately.

USAGE EXAMPLES:
    # Submit a draft for immediate publish on approval
    draft-submit --author U123 \"Release 2.0 is out!\"

    # Submit from stdin
    echo \"Release 2.0 is out!\" | draft-submit --author U123

    # Publish two hours after approval
    draft-submit --author U123 --schedule 2h \"Reminder: office closed\"

    # Publish at an absolute local time
    draft-submit --author U123 --schedule \"2026-09-01 15:00\" \"Launch!\"

    # Attach uploaded media by reference
    draft-submit --author U123 --media F001 --media F002 \"With pictures\"

CONFIGURATION:
    Configuration file: ~/.config/draftgate/config.toml
    Database location: ~/.local/share/draftgate/drafts.db

    Override with environment variables:
        DRAFTGATE_CONFIG   - Path to config file
        DRAFTGATE_AUTHOR   - Default author id

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Missing publisher credentials
    3 - Invalid input (empty text, bad schedule, too many media)
")]
struct Cli {
    /// Draft text; read from stdin when omitted
    text: Option<String>,

    /// Author user id
    #[arg(short, long, env = "DRAFTGATE_AUTHOR")]
    author: String,

    /// Media reference (repeatable, at most 4)
    #[arg(short, long = "media")]
    media: Vec<String>,

    /// Publish time after approval (e.g. "2h", "tomorrow 9am",
    /// "2026-09-01 15:00"); immediate when omitted
    #[arg(short, long)]
    schedule: Option<String>,

    /// Channel to notify with the outcome
    #[arg(long, default_value = "cli")]
    channel: String,

    /// Location within the channel (thread timestamp, message id)
    #[arg(long, default_value = "-")]
    location: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
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

    let text = match cli.text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| DraftgateError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
            buf.trim_end().to_string()
        }
    };

    let scheduled_at = cli
        .schedule
        .as_deref()
        .map(|s| libdraftgate::schedule::parse_schedule(s, config.review.utc_offset_hours))
        .transpose()?
        .map(|dt| dt.timestamp());

    let store = Arc::new(RecordStore::new(&config.database.path).await?);
    let registry = ApprovalRegistry::new(Arc::clone(&store));
    let ledger = ScheduleLedger::new(Arc::clone(&store), Arc::new(NullScheduler));
    let publisher = build_publisher(&config);
    let views = ListViewSynchronizer::new(
        Arc::clone(&store),
        registry.clone(),
        ledger.clone(),
        Arc::new(TextRenderer) as Arc<dyn ViewRenderer>,
    );
    let coordinator = PublicationCoordinator::new(
        store,
        registry,
        ledger,
        publisher,
        Arc::new(TextNotifier) as Arc<dyn Notifier>,
        config.review.prevent_self_approve,
    )
    .with_views(views);

    let draft = Draft::new(
        text,
        cli.author,
        cli.media,
        scheduled_at,
        ViewRef::new(cli.channel, cli.location),
    );

    let receipt = coordinator.submit(&draft).await?;

    println!("Submitted draft {}", receipt.draft_id);
    if let Some(ts) = scheduled_at {
        println!(
            "Will publish at {} once approved",
            chrono::DateTime::from_timestamp(ts, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| ts.to_string())
        );
    }
    if let Some(overage) = receipt.over_limit {
        eprintln!(
            "Warning: draft is {} characters over the publish limit and will likely be refused",
            overage
        );
    }

    Ok(())
}

fn build_publisher(config: &Config) -> Arc<dyn Publisher> {
    let publisher_config = config.publisher.clone().unwrap_or(PublisherConfig {
        api_key: None,
        api_secret: None,
        access_token: None,
        access_secret: None,
    });
    Arc::new(XPublisher::from_config(&publisher_config))
}
