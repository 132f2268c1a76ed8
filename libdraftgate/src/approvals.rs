//! Approval registry: drafts awaiting a human decision
//!
//! An ApprovalRecord lives from submission until a reviewer decision is
//! accepted. `resolve` is take-and-remove; a caller that gets `None` must
//! treat the draft as already handled by someone else.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::{ApprovalRecord, Draft};

#[derive(Clone)]
pub struct ApprovalRegistry {
    store: Arc<RecordStore>,
}

impl ApprovalRegistry {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Register a freshly submitted draft as pending approval.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` on a draft id collision (should not happen
    /// with fresh uuids) and store errors otherwise.
    pub async fn submit(&self, draft: &Draft) -> Result<ApprovalRecord> {
        let record = ApprovalRecord {
            draft: draft.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.store.put_pending(&record).await?;
        debug!(draft_id = %draft.id, author = %draft.author_id, "draft pending approval");
        Ok(record)
    }

    pub async fn get(&self, draft_id: &str) -> Result<Option<ApprovalRecord>> {
        self.store.get_pending(draft_id).await
    }

    /// All pending records, unordered. Consumers sort for display.
    pub async fn list(&self) -> Result<Vec<ApprovalRecord>> {
        self.store.list_pending().await
    }

    /// Atomically take the record out of the registry. Exactly one of any
    /// set of concurrent resolvers gets `Some`; losers get `None` and must
    /// treat the draft as already handled (a no-op, not an error).
    pub async fn resolve(&self, draft_id: &str) -> Result<Option<ApprovalRecord>> {
        let taken = self.store.take_pending(draft_id).await?;
        if taken.is_some() {
            debug!(draft_id, "approval record resolved");
        } else {
            debug!(draft_id, "approval record already resolved elsewhere");
        }
        Ok(taken)
    }
}
