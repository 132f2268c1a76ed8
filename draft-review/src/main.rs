//! draft-review - Review pending drafts
//!
//! Unix-style tool for reviewers: list what is waiting, then approve or
//! reject. Approval publishes immediately, or schedules when the draft
//! carries a publish time.

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
    ApprovalRegistry, Config, Decision, DecisionOutcome, PublicationCoordinator, RecordStore,
    Result, ScheduleLedger,
};

#[derive(Parser, Debug)]
#[command(name = "draft-review")]
#[command(version)]
#[command(about = "Review pending drafts: approve or reject")]
#[command(long_about = "\
draft-review - Review pending drafts

DESCRIPTION:
    draft-review lists drafts waiting for a decision and applies reviewer
    verdicts. Approving a draft publishes it immediately, or schedules it
    if the draft was submitted with a publish time. Two reviewers racing
    on the same draft is safe: one wins, the other is told it was already
    handled.

COMMANDS:
    list        List drafts pending review
    approve     Approve a draft (publishes or schedules)
    reject      Reject a draft

USAGE EXAMPLES:
    # See what is waiting
    draft-review list

    # Approve as reviewer U456
    draft-review approve 3f2a91c0-... --reviewer U456

    # Reject
    draft-review reject 3f2a91c0-... --reviewer U456

CONFIGURATION:
    Configuration file: ~/.config/draftgate/config.toml
    Database location: ~/.local/share/draftgate/drafts.db

    Override with environment variables:
        DRAFTGATE_CONFIG     - Path to config file
        DRAFTGATE_REVIEWER   - Default reviewer id

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Missing publisher credentials
    3 - Invalid input or policy denied (e.g. reviewing your own draft)
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
    /// List drafts pending review
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Approve a draft
    Approve {
        /// Draft id to approve
        draft_id: String,

        /// Reviewer user id
        #[arg(short, long, env = "DRAFTGATE_REVIEWER")]
        reviewer: String,
    },

    /// Reject a draft
    Reject {
        /// Draft id to reject
        draft_id: String,

        /// Reviewer user id
        #[arg(short, long, env = "DRAFTGATE_REVIEWER")]
        reviewer: String,
    },
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
    let publisher = build_publisher(&config);
    let views = ListViewSynchronizer::new(
        Arc::clone(&store),
        registry.clone(),
        ledger.clone(),
        Arc::new(TextRenderer) as Arc<dyn ViewRenderer>,
    );
    let coordinator = PublicationCoordinator::new(
        Arc::clone(&store),
        registry.clone(),
        ledger,
        publisher,
        Arc::new(TextNotifier) as Arc<dyn Notifier>,
        config.review.prevent_self_approve,
    )
    .with_views(views);

    match cli.command {
        Commands::List { format } => list_pending(&registry, &format).await,
        Commands::Approve { draft_id, reviewer } => {
            let outcome = coordinator
                .decide(&draft_id, &reviewer, Decision::Approve)
                .await?;
            print_outcome(&draft_id, outcome);
            Ok(())
        }
        Commands::Reject { draft_id, reviewer } => {
            let outcome = coordinator
                .decide(&draft_id, &reviewer, Decision::Reject)
                .await?;
            print_outcome(&draft_id, outcome);
            Ok(())
        }
    }
}

async fn list_pending(registry: &ApprovalRegistry, format: &str) -> Result<()> {
    let mut pending = registry.list().await?;
    pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    if format == "json" {
        let items: Vec<serde_json::Value> = pending
            .iter()
            .map(|r| {
                serde_json::json!({
                    "draft_id": r.draft.id,
                    "author_id": r.draft.author_id,
                    "text": r.draft.text,
                    "scheduled_at": r.draft.scheduled_at,
                    "media_refs": r.draft.media_refs,
                    "created_at": r.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default());
        return Ok(());
    }

    if pending.is_empty() {
        println!("No drafts pending review.");
        return Ok(());
    }

    for record in pending {
        let when = match record.draft.scheduled_at {
            Some(ts) => chrono::DateTime::from_timestamp(ts, 0)
                .map(|t| format!("publish at {}", t.format("%Y-%m-%d %H:%M UTC")))
                .unwrap_or_else(|| format!("publish at {}", ts)),
            None => "publish immediately".to_string(),
        };
        println!(
            "{}  @{}  ({})\n    {}",
            record.draft.id, record.draft.author_id, when, record.draft.text
        );
    }

    Ok(())
}

fn print_outcome(draft_id: &str, outcome: DecisionOutcome) {
    match outcome {
        DecisionOutcome::Published { post_id } => {
            println!("Approved and published: {}", post_id)
        }
        DecisionOutcome::Scheduled { job_id, fire_at } => {
            let when = chrono::DateTime::from_timestamp(fire_at, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| fire_at.to_string());
            println!("Approved; scheduled as job {} for {}", job_id, when)
        }
        DecisionOutcome::Rejected => println!("Rejected {}", draft_id),
        DecisionOutcome::Cancelled => println!("Cancelled {}", draft_id),
        DecisionOutcome::AlreadyProcessed => {
            println!("Draft {} was already handled by someone else", draft_id)
        }
    }
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
