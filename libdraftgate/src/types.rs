//! Core types for Draftgate

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of media references a draft may carry.
pub const MAX_MEDIA_REFS: usize = 4;

/// A display surface that tracks status: a channel plus a message location
/// within it (a thread timestamp, a message id, whatever the renderer uses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRef {
    pub channel: String,
    pub location: String,
}

impl ViewRef {
    pub fn new(channel: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            location: location.into(),
        }
    }

    /// Composite id used as the list-view primary key.
    pub fn composite_id(&self) -> String {
        format!("{}:{}", self.channel, self.location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStatus {
    PendingApproval,
    Scheduled,
    Published,
    Rejected,
    Cancelled,
    Expired,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::PendingApproval => "pending_approval",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Published => "published",
            DraftStatus::Rejected => "rejected",
            DraftStatus::Cancelled => "cancelled",
            DraftStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_approval" => Some(DraftStatus::PendingApproval),
            "scheduled" => Some(DraftStatus::Scheduled),
            "published" => Some(DraftStatus::Published),
            "rejected" => Some(DraftStatus::Rejected),
            "cancelled" => Some(DraftStatus::Cancelled),
            "expired" => Some(DraftStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DraftStatus::PendingApproval | DraftStatus::Scheduled)
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-authored post awaiting a publish decision.
///
/// All fields except status bookkeeping are write-once at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub media_refs: Vec<String>,
    /// Publish time resolved to a Unix timestamp (UTC) at submission.
    /// `None` means publish immediately on approval.
    pub scheduled_at: Option<i64>,
    /// Where completion and failure notices for this draft go.
    pub origin: ViewRef,
    pub created_at: i64,
}

impl Draft {
    pub fn new(
        text: String,
        author_id: String,
        media_refs: Vec<String>,
        scheduled_at: Option<i64>,
        origin: ViewRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            author_id,
            media_refs,
            scheduled_at,
            origin,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Persisted pending-decision state for a draft. Key = draft id.
/// Owned exclusively by the approval registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRecord {
    pub draft: Draft,
    pub created_at: i64,
}

/// A registered future one-shot publish action for an approved,
/// time-delayed draft. Key = job id, 1:1 with the draft id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub job_id: String,
    pub fire_at: i64,
    pub draft: Draft,
    pub created_at: i64,
}

/// One live rendered status surface. `expire_at` is fixed at creation and
/// never refreshed; the view retires regardless of activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ListViewEntry {
    pub id: String,
    pub channel: String,
    pub location: String,
    pub expire_at: i64,
}

impl ListViewEntry {
    pub fn view_ref(&self) -> ViewRef {
        ViewRef::new(self.channel.clone(), self.location.clone())
    }
}

/// A reviewer's verdict on a pending draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Recorded terminal outcome for a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftOutcome {
    pub draft_id: String,
    pub status: DraftStatus,
    pub detail: Option<String>,
    pub recorded_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_new_uuid_and_timestamp() {
        let before = chrono::Utc::now().timestamp();
        let draft = Draft::new(
            "Hello".to_string(),
            "U_AUTHOR".to_string(),
            vec![],
            None,
            ViewRef::new("C1", "100.1"),
        );
        let after = chrono::Utc::now().timestamp();

        assert!(uuid::Uuid::parse_str(&draft.id).is_ok());
        assert!(draft.created_at >= before && draft.created_at <= after);
        assert_eq!(draft.scheduled_at, None);
    }

    #[test]
    fn test_draft_unique_ids() {
        let origin = ViewRef::new("C1", "100.1");
        let a = Draft::new("a".into(), "U1".into(), vec![], None, origin.clone());
        let b = Draft::new("b".into(), "U1".into(), vec![], None, origin);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_view_ref_composite_id() {
        let view = ViewRef::new("C042", "1700000000.000100");
        assert_eq!(view.composite_id(), "C042:1700000000.000100");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DraftStatus::PendingApproval,
            DraftStatus::Scheduled,
            DraftStatus::Published,
            DraftStatus::Rejected,
            DraftStatus::Cancelled,
            DraftStatus::Expired,
        ] {
            assert_eq!(DraftStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DraftStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!DraftStatus::PendingApproval.is_terminal());
        assert!(!DraftStatus::Scheduled.is_terminal());
        assert!(DraftStatus::Published.is_terminal());
        assert!(DraftStatus::Rejected.is_terminal());
        assert!(DraftStatus::Cancelled.is_terminal());
        assert!(DraftStatus::Expired.is_terminal());
    }

    #[test]
    fn test_draft_serialization_round_trip() {
        let draft = Draft {
            id: "d-1".to_string(),
            text: "check https://example.com".to_string(),
            author_id: "U_AUTHOR".to_string(),
            media_refs: vec!["F001".to_string(), "F002".to_string()],
            scheduled_at: Some(1_900_000_000),
            origin: ViewRef::new("C1", "100.1"),
            created_at: 1_800_000_000,
        };

        let json = serde_json::to_string(&draft).unwrap();
        let back: Draft = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draft);
    }
}
