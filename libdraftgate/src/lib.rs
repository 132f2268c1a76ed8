//! Draftgate - reviewed publishing for team drafts
//!
//! This library coordinates a draft's path from submission through reviewer
//! approval to an immediate or scheduled publish, with race-safe
//! deduplication and live status views.

pub mod approvals;
pub mod charcount;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod publisher;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod views;

// Re-export commonly used types
pub use approvals::ApprovalRegistry;
pub use config::Config;
pub use coordinator::{DecisionOutcome, PublicationCoordinator, SubmitReceipt};
pub use error::{DraftgateError, Result};
pub use ledger::ScheduleLedger;
pub use store::RecordStore;
pub use types::{Decision, Draft, DraftStatus, ViewRef};
