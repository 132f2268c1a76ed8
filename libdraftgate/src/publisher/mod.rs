//! Publishing abstraction
//!
//! A `Publisher` turns an approved draft into a live post and returns the
//! target's post id. The coordinator never retries a publish; a failure is
//! reported back to the draft's origin and the draft is gone.

use async_trait::async_trait;

use crate::charcount;
use crate::error::{DraftgateError, Result};
use crate::types::{Draft, MAX_MEDIA_REFS};

pub mod x;

// Mock publisher is available for all builds (not just tests) to support
// integration tests.
pub mod mock;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the draft and return the target's post id.
    ///
    /// # Errors
    ///
    /// Returns `Publish(Credentials)` for missing or rejected credentials,
    /// `Publish(Api)` when the target refuses the post, and
    /// `Publish(Network)` for transport failures.
    async fn publish(&self, draft: &Draft) -> Result<String>;

    /// Check a draft against the target's structural requirements. Called
    /// at submission, before any review happens.
    fn validate(&self, draft: &Draft) -> Result<()> {
        if draft.text.trim().is_empty() {
            return Err(DraftgateError::InvalidInput(
                "Draft text cannot be empty".to_string(),
            ));
        }
        if draft.media_refs.len() > MAX_MEDIA_REFS {
            return Err(DraftgateError::InvalidInput(format!(
                "At most {} media attachments allowed (got {})",
                MAX_MEDIA_REFS,
                draft.media_refs.len()
            )));
        }
        Ok(())
    }

    /// Advisory length check; `Some(overage)` means the target will likely
    /// reject the post. Never blocks submission.
    fn over_limit(&self, draft: &Draft) -> Option<usize> {
        charcount::over_limit(&draft.text)
    }

    /// Lowercase identifier for the target (e.g. "x", "mock").
    fn name(&self) -> &str;

    /// Whether credentials are present. Checked before attempting to
    /// publish so misconfiguration fails fast.
    fn is_configured(&self) -> bool;
}
