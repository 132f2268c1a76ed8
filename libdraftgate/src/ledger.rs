//! Schedule ledger: approved-for-later drafts and their live jobs
//!
//! `claim` is the dedup primitive. A human clicking cancel, a human
//! clicking post-now, and the timer's own fire callback all call it;
//! whoever deletes the job row first wins exclusively and everyone else
//! observes `None`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::scheduler::{FireHandler, Scheduler};
use crate::store::RecordStore;
use crate::types::{Draft, ScheduledJob};

#[derive(Clone)]
pub struct ScheduleLedger {
    store: Arc<RecordStore>,
    scheduler: Arc<dyn Scheduler>,
}

impl ScheduleLedger {
    pub fn new(store: Arc<RecordStore>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Install the callback invoked when an armed timer fires. The callback
    /// must itself `claim` the job before acting.
    pub fn on_fire(&self, handler: FireHandler) {
        self.scheduler.on_fire(handler);
    }

    /// Persist a job for the draft and arm a one-shot timer.
    ///
    /// The job row goes in first so a fired timer always finds something to
    /// claim. If timer registration fails the row is removed again and
    /// `SchedulerUnavailable` is returned; the caller must not advance the
    /// draft's status.
    pub async fn schedule(&self, draft: &Draft, fire_at: DateTime<Utc>) -> Result<String> {
        let job = ScheduledJob {
            job_id: uuid::Uuid::new_v4().to_string(),
            fire_at: fire_at.timestamp(),
            draft: draft.clone(),
            created_at: Utc::now().timestamp(),
        };

        self.store.put_job(&job).await?;

        if let Err(e) = self.scheduler.register(fire_at, &job.job_id).await {
            warn!(job_id = %job.job_id, error = %e, "timer registration failed, unwinding job");
            let _ = self.store.take_job(&job.job_id).await;
            return Err(e);
        }

        debug!(job_id = %job.job_id, draft_id = %draft.id, %fire_at, "draft scheduled");
        Ok(job.job_id)
    }

    /// Atomically cancel-or-consume the job. Exactly one concurrent caller
    /// gets the draft payload back; everyone else gets `None` and must
    /// treat the draft as already handled.
    pub async fn claim(&self, job_id: &str) -> Result<Option<Draft>> {
        let taken = self.store.take_job(job_id).await?;

        match taken {
            Some(job) => {
                // The row is gone; the timer (if any, and if it has not
                // fired yet) is now pointless. Disarming it is best-effort.
                let _ = self.scheduler.cancel(job_id).await;
                debug!(job_id, draft_id = %job.draft.id, "job claimed");
                Ok(Some(job.draft))
            }
            None => {
                debug!(job_id, "job already claimed elsewhere");
                Ok(None)
            }
        }
    }

    /// All live jobs, unordered.
    pub async fn list(&self) -> Result<Vec<ScheduledJob>> {
        self.store.list_jobs().await
    }

    /// Jobs whose fire time has passed, soonest first. Used by the polling
    /// daemon; each returned job must still be claimed before publishing.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        self.store.due_jobs(now.timestamp()).await
    }

    /// Look up the live job for a draft, if one exists.
    pub async fn find_by_draft(&self, draft_id: &str) -> Result<Option<ScheduledJob>> {
        self.store.find_job_by_draft(draft_id).await
    }
}
