//! Publication coordinator
//!
//! Drives a draft through its whole life: submission, reviewer decision,
//! immediate or scheduled publish, cancellation, and expiry. Every path
//! that consumes a draft goes through the registry's `resolve` or the
//! ledger's `claim`, so concurrent actors cannot publish twice or notify
//! twice; losers of those races see `AlreadyProcessed`.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use crate::approvals::ApprovalRegistry;
use crate::error::{DraftgateError, Result};
use crate::ledger::ScheduleLedger;
use crate::publisher::Publisher;
use crate::store::RecordStore;
use crate::types::{Decision, Draft, DraftStatus};
use crate::views::{ListViewSynchronizer, Notifier};

/// What a decision or queue action settled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Published { post_id: String },
    Scheduled { job_id: String, fire_at: i64 },
    Rejected,
    Cancelled,
    /// A concurrent actor got there first; nothing was done.
    AlreadyProcessed,
}

/// Receipt returned at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub draft_id: String,
    /// Characters over the publish target's limit, if any. Advisory; the
    /// draft is accepted either way.
    pub over_limit: Option<usize>,
}

#[derive(Clone)]
pub struct PublicationCoordinator {
    store: Arc<RecordStore>,
    registry: ApprovalRegistry,
    ledger: ScheduleLedger,
    publisher: Arc<dyn Publisher>,
    notifier: Arc<dyn Notifier>,
    views: Option<ListViewSynchronizer>,
    prevent_self_approve: bool,
}

impl PublicationCoordinator {
    pub fn new(
        store: Arc<RecordStore>,
        registry: ApprovalRegistry,
        ledger: ScheduleLedger,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
        prevent_self_approve: bool,
    ) -> Self {
        Self {
            store,
            registry,
            ledger,
            publisher,
            notifier,
            views: None,
            prevent_self_approve,
        }
    }

    /// Attach a view synchronizer so every state change refreshes the open
    /// status views. Without one, views only catch up on the next explicit
    /// reconcile (the daemon does one per pass).
    pub fn with_views(mut self, views: ListViewSynchronizer) -> Self {
        self.views = Some(views);
        self
    }

    /// Best-effort view refresh after a state change. A failed refresh
    /// never fails the operation that triggered it.
    async fn refresh_views(&self) {
        if let Some(views) = &self.views {
            if let Err(e) = views.reconcile().await {
                warn!(error = %e, "view refresh after state change failed");
            }
        }
    }

    pub fn registry(&self) -> &ApprovalRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ScheduleLedger {
        &self.ledger
    }

    /// Wire the in-process timer path: a fired timer claims its own job
    /// through `fire`, so it coexists safely with the polling daemon.
    pub fn install_fire_handler(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        self.ledger.on_fire(Arc::new(move |job_id| {
            let coordinator = Arc::clone(&coordinator);
            Box::pin(async move {
                if let Err(e) = coordinator.fire(&job_id).await {
                    error!(job_id = %job_id, error = %e, "timer-fired publish failed");
                }
            })
        }));
    }

    /// Accept a draft into review. Validation is structural only; an
    /// over-length text comes back as a warning on the receipt.
    pub async fn submit(&self, draft: &Draft) -> Result<SubmitReceipt> {
        self.publisher.validate(draft)?;

        if let Some(ts) = draft.scheduled_at {
            if ts <= Utc::now().timestamp() {
                return Err(DraftgateError::InvalidInput(format!(
                    "Scheduled time is in the past: {}",
                    ts
                )));
            }
        }

        let record = self.registry.submit(draft).await?;
        info!(draft_id = %record.draft.id, "draft submitted for review");
        self.refresh_views().await;

        Ok(SubmitReceipt {
            draft_id: record.draft.id,
            over_limit: self.publisher.over_limit(draft),
        })
    }

    /// Apply a reviewer's verdict.
    ///
    /// The self-review policy is checked against a plain read before any
    /// state moves, and covers rejection as well as approval. The record is
    /// then resolved atomically; a lost race comes back as
    /// `AlreadyProcessed` rather than an error.
    pub async fn decide(
        &self,
        draft_id: &str,
        reviewer_id: &str,
        decision: Decision,
    ) -> Result<DecisionOutcome> {
        if self.prevent_self_approve {
            if let Some(record) = self.registry.get(draft_id).await? {
                if record.draft.author_id == reviewer_id {
                    debug!(draft_id, reviewer_id, "self review denied");
                    return Err(DraftgateError::PolicyDenied(
                        "You cannot review your own draft".to_string(),
                    ));
                }
            }
        }

        let record = match self.registry.resolve(draft_id).await? {
            Some(record) => record,
            None => return Ok(DecisionOutcome::AlreadyProcessed),
        };
        let draft = record.draft;

        // The draft is consumed either way, so views refresh even when the
        // publish or schedule attempt fails.
        let outcome = async {
            match decision {
                Decision::Reject => {
                    self.store
                        .record_outcome(&draft.id, DraftStatus::Rejected, None)
                        .await?;
                    let _ = self
                        .notifier
                        .notify(&draft.origin, "Your draft was rejected.")
                        .await;
                    info!(draft_id = %draft.id, reviewer_id, "draft rejected");
                    Ok(DecisionOutcome::Rejected)
                }
                Decision::Approve => match draft.scheduled_at {
                    Some(ts) if ts > Utc::now().timestamp() => {
                        self.schedule_approved(&draft, ts).await
                    }
                    // No schedule, or the window passed while the draft sat
                    // in review: publish right away.
                    _ => {
                        let post_id = self.publish_consumed(&draft).await?;
                        Ok(DecisionOutcome::Published { post_id })
                    }
                },
            }
        }
        .await;

        self.refresh_views().await;
        outcome
    }

    /// Publish a scheduled draft immediately, ahead of its timer.
    pub async fn post_now(&self, draft_id: &str) -> Result<DecisionOutcome> {
        let job = match self.ledger.find_by_draft(draft_id).await? {
            Some(job) => job,
            None => return Ok(DecisionOutcome::AlreadyProcessed),
        };

        let outcome = match self.ledger.claim(&job.job_id).await? {
            Some(draft) => self
                .publish_consumed(&draft)
                .await
                .map(|post_id| DecisionOutcome::Published { post_id }),
            None => Ok(DecisionOutcome::AlreadyProcessed),
        };

        self.refresh_views().await;
        outcome
    }

    /// Cancel a scheduled draft before it fires.
    pub async fn cancel(&self, draft_id: &str) -> Result<DecisionOutcome> {
        let job = match self.ledger.find_by_draft(draft_id).await? {
            Some(job) => job,
            None => return Ok(DecisionOutcome::AlreadyProcessed),
        };

        let outcome = match self.ledger.claim(&job.job_id).await? {
            Some(draft) => {
                self.store
                    .record_outcome(&draft.id, DraftStatus::Cancelled, None)
                    .await?;
                let _ = self
                    .notifier
                    .notify(&draft.origin, "Scheduled draft was cancelled.")
                    .await;
                info!(draft_id = %draft.id, "scheduled draft cancelled");
                DecisionOutcome::Cancelled
            }
            None => DecisionOutcome::AlreadyProcessed,
        };

        self.refresh_views().await;
        Ok(outcome)
    }

    /// Timer-fire entry point. A lost claim is a silent no-op: the draft
    /// was cancelled or posted early, both legitimate.
    pub async fn fire(&self, job_id: &str) -> Result<()> {
        match self.ledger.claim(job_id).await? {
            Some(draft) => {
                let result = self.publish_consumed(&draft).await.map(|_| ());
                self.refresh_views().await;
                result
            }
            None => {
                debug!(job_id, "fired job already handled, nothing to do");
                Ok(())
            }
        }
    }

    /// Publish every job whose fire time has arrived. Returns how many this
    /// call actually published; jobs claimed away mid-pass are skipped.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut published = 0;
        for job in self.ledger.due(now).await? {
            match self.ledger.claim(&job.job_id).await? {
                Some(draft) => {
                    if let Err(e) = self.publish_consumed(&draft).await {
                        warn!(draft_id = %draft.id, error = %e, "due publish failed");
                    } else {
                        published += 1;
                    }
                }
                None => {
                    debug!(job_id = %job.job_id, "due job claimed elsewhere");
                }
            }
        }
        if published > 0 {
            self.refresh_views().await;
        }
        Ok(published)
    }

    /// Expire jobs that overshot their fire time by more than `horizon`,
    /// typically because no daemon was running. Returns how many expired.
    pub async fn sweep_expired(&self, now: DateTime<Utc>, horizon: Duration) -> Result<usize> {
        let cutoff = now - horizon;
        let mut expired = 0;

        for job in self.ledger.due(cutoff).await? {
            if let Some(draft) = self.ledger.claim(&job.job_id).await? {
                self.store
                    .record_outcome(&draft.id, DraftStatus::Expired, None)
                    .await?;
                let fire_at = Utc
                    .timestamp_opt(job.fire_at, 0)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| job.fire_at.to_string());
                let _ = self
                    .notifier
                    .notify(
                        &draft.origin,
                        &format!("Scheduled draft missed its window ({}) and expired.", fire_at),
                    )
                    .await;
                warn!(draft_id = %draft.id, fire_at = job.fire_at, "scheduled draft expired");
                expired += 1;
            }
        }

        if expired > 0 {
            self.refresh_views().await;
        }
        Ok(expired)
    }

    async fn schedule_approved(&self, draft: &Draft, fire_at_ts: i64) -> Result<DecisionOutcome> {
        let fire_at = Utc.timestamp_opt(fire_at_ts, 0).single().ok_or_else(|| {
            DraftgateError::InvalidInput(format!("Timestamp out of range: {}", fire_at_ts))
        })?;

        match self.ledger.schedule(draft, fire_at).await {
            Ok(job_id) => {
                let _ = self
                    .notifier
                    .notify(
                        &draft.origin,
                        &format!(
                            "Approved. Will publish at {}.",
                            fire_at.format("%Y-%m-%d %H:%M UTC")
                        ),
                    )
                    .await;
                info!(draft_id = %draft.id, %job_id, "approved draft scheduled");
                Ok(DecisionOutcome::Scheduled {
                    job_id,
                    fire_at: fire_at_ts,
                })
            }
            Err(e) => {
                // The approval record is already consumed; the draft cannot
                // be re-queued from here. Surface the loss at the origin.
                error!(draft_id = %draft.id, error = %e, "scheduling failed after approval");
                let _ = self
                    .notifier
                    .notify(
                        &draft.origin,
                        "Approval was recorded but scheduling failed; please resubmit the draft.",
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Publish a draft that has already been taken out of the registry or
    /// ledger. Success records the one terminal outcome and notifies the
    /// origin; failure notifies and propagates without retrying.
    async fn publish_consumed(&self, draft: &Draft) -> Result<String> {
        match self.publisher.publish(draft).await {
            Ok(post_id) => {
                self.store
                    .record_outcome(&draft.id, DraftStatus::Published, Some(&post_id))
                    .await?;
                let _ = self
                    .notifier
                    .notify(&draft.origin, &format!("Published: {}", post_id))
                    .await;
                info!(draft_id = %draft.id, post_id = %post_id, "draft published");
                Ok(post_id)
            }
            Err(e) => {
                let _ = self
                    .notifier
                    .notify(
                        &draft.origin,
                        &format!("Publish failed: {}. Please resubmit the draft.", e),
                    )
                    .await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::publisher::mock::MockPublisher;
    use crate::scheduler::{NullScheduler, Scheduler, UnavailableScheduler};
    use crate::types::ViewRef;
    use crate::views::mock::MockNotifier;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<RecordStore>,
        publisher: Arc<MockPublisher>,
        notifier: Arc<MockNotifier>,
        coordinator: PublicationCoordinator,
        _tmp: TempDir,
    }

    async fn setup_with(
        publisher: MockPublisher,
        scheduler: Arc<dyn Scheduler>,
        prevent_self_approve: bool,
    ) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");
        let store = Arc::new(RecordStore::new(db_path.to_str().unwrap()).await.unwrap());
        let registry = ApprovalRegistry::new(Arc::clone(&store));
        let ledger = ScheduleLedger::new(Arc::clone(&store), scheduler);
        let publisher = Arc::new(publisher);
        let notifier = Arc::new(MockNotifier::new());
        let coordinator = PublicationCoordinator::new(
            Arc::clone(&store),
            registry,
            ledger,
            publisher.clone() as Arc<dyn Publisher>,
            notifier.clone() as Arc<dyn Notifier>,
            prevent_self_approve,
        );
        Fixture {
            store,
            publisher,
            notifier,
            coordinator,
            _tmp: tmp,
        }
    }

    async fn setup() -> Fixture {
        setup_with(MockPublisher::success(), Arc::new(NullScheduler), true).await
    }

    fn draft(text: &str, scheduled_at: Option<i64>) -> Draft {
        Draft::new(
            text.to_string(),
            "U_AUTHOR".to_string(),
            vec![],
            scheduled_at,
            ViewRef::new("C_APPROVAL", "100.1"),
        )
    }

    #[tokio::test]
    async fn test_submit_and_approve_publishes_immediately() {
        let f = setup().await;
        let d = draft("ship it", None);
        let receipt = f.coordinator.submit(&d).await.unwrap();
        assert_eq!(receipt.over_limit, None);

        let outcome = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::Published { .. }));
        assert_eq!(f.publisher.publish_call_count(), 1);

        let recorded = f.store.get_outcome(&d.id).await.unwrap().unwrap();
        assert_eq!(recorded.status, DraftStatus::Published);
    }

    #[tokio::test]
    async fn test_submit_past_schedule_rejected() {
        let f = setup().await;
        let d = draft("too late", Some(Utc::now().timestamp() - 60));
        let result = f.coordinator.submit(&d).await;
        assert!(matches!(result, Err(DraftgateError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_submit_over_limit_warns_but_accepts() {
        let f = setup().await;
        let d = draft(&"x".repeat(300), None);
        let receipt = f.coordinator.submit(&d).await.unwrap();
        assert_eq!(receipt.over_limit, Some(20));
        assert!(f.coordinator.registry().get(&d.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reject_records_outcome_and_notifies() {
        let f = setup().await;
        let d = draft("no thanks", None);
        f.coordinator.submit(&d).await.unwrap();

        let outcome = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Reject)
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Rejected);
        assert_eq!(f.publisher.publish_call_count(), 0);

        let notes = f.notifier.notes();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].1.contains("rejected"));
    }

    #[tokio::test]
    async fn test_self_review_denied_for_both_decisions() {
        let f = setup().await;
        let d = draft("mine", None);
        f.coordinator.submit(&d).await.unwrap();

        for decision in [Decision::Approve, Decision::Reject] {
            let result = f.coordinator.decide(&d.id, "U_AUTHOR", decision).await;
            assert!(matches!(result, Err(DraftgateError::PolicyDenied(_))));
        }

        // Draft untouched, another reviewer can still decide
        assert!(f.coordinator.registry().get(&d.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_self_review_allowed_when_policy_off() {
        let f = setup_with(MockPublisher::success(), Arc::new(NullScheduler), false).await;
        let d = draft("mine", None);
        f.coordinator.submit(&d).await.unwrap();

        let outcome = f
            .coordinator
            .decide(&d.id, "U_AUTHOR", Decision::Approve)
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_decisions_one_winner() {
        let f = setup().await;
        let d = draft("contested", None);
        f.coordinator.submit(&d).await.unwrap();

        let (a, b) = tokio::join!(
            f.coordinator.decide(&d.id, "U_R1", Decision::Approve),
            f.coordinator.decide(&d.id, "U_R2", Decision::Approve),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let published = outcomes
            .iter()
            .filter(|o| matches!(o, DecisionOutcome::Published { .. }))
            .count();
        let lost = outcomes
            .iter()
            .filter(|o| matches!(o, DecisionOutcome::AlreadyProcessed))
            .count();
        assert_eq!((published, lost), (1, 1));
        assert_eq!(f.publisher.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_approve_scheduled_creates_job_not_publish() {
        let f = setup().await;
        let fire_at = Utc::now().timestamp() + 7200;
        let d = draft("later", Some(fire_at));
        f.coordinator.submit(&d).await.unwrap();

        let outcome = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DecisionOutcome::Scheduled { fire_at: t, .. } if t == fire_at
        ));
        assert_eq!(f.publisher.publish_call_count(), 0);
        assert!(f
            .coordinator
            .ledger()
            .find_by_draft(&d.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_approve_after_window_passed_publishes_now() {
        let f = setup().await;
        // Valid at submission, past by decision time
        let d = draft("stale window", Some(Utc::now().timestamp() - 5));
        f.coordinator.registry().submit(&d).await.unwrap();

        let outcome = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn test_scheduler_failure_after_approval_loses_draft() {
        let f = setup_with(
            MockPublisher::success(),
            Arc::new(UnavailableScheduler),
            true,
        )
        .await;
        let d = draft("doomed", Some(Utc::now().timestamp() + 7200));
        f.coordinator.submit(&d).await.unwrap();

        let result = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await;
        assert!(matches!(
            result,
            Err(DraftgateError::SchedulerUnavailable(_))
        ));

        // The approval record is consumed and no job exists: the draft is
        // gone and the author was told to resubmit.
        assert!(f.coordinator.registry().get(&d.id).await.unwrap().is_none());
        assert!(f
            .coordinator
            .ledger()
            .find_by_draft(&d.id)
            .await
            .unwrap()
            .is_none());
        let notes = f.notifier.notes();
        assert!(notes.iter().any(|(_, text)| text.contains("resubmit")));
    }

    #[tokio::test]
    async fn test_publish_failure_notifies_and_propagates() {
        let f = setup_with(
            MockPublisher::failure(PublishError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Arc::new(NullScheduler),
            true,
        )
        .await;
        let d = draft("unlucky", None);
        f.coordinator.submit(&d).await.unwrap();

        let result = f
            .coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await;
        assert!(matches!(result, Err(DraftgateError::Publish(_))));
        assert_eq!(f.publisher.publish_call_count(), 1, "no retry");

        let notes = f.notifier.notes();
        assert!(notes.iter().any(|(_, text)| text.contains("failed")));
        assert!(f.store.get_outcome(&d.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_scheduled_draft() {
        let f = setup().await;
        let d = draft("changed my mind", Some(Utc::now().timestamp() + 7200));
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        let outcome = f.coordinator.cancel(&d.id).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Cancelled);
        assert_eq!(f.publisher.publish_call_count(), 0);

        // Second cancel is a clean no-op
        let again = f.coordinator.cancel(&d.id).await.unwrap();
        assert_eq!(again, DecisionOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn test_post_now_beats_timer() {
        let f = setup().await;
        let d = draft("now please", Some(Utc::now().timestamp() + 7200));
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        let outcome = f.coordinator.post_now(&d.id).await.unwrap();
        assert!(matches!(outcome, DecisionOutcome::Published { .. }));
        assert_eq!(f.publisher.publish_call_count(), 1);

        // The job is consumed; a later fire does nothing
        let job = f.coordinator.ledger().find_by_draft(&d.id).await.unwrap();
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn test_cancel_vs_post_now_race_single_winner() {
        let f = setup().await;
        let d = draft("contested job", Some(Utc::now().timestamp() + 7200));
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        let (cancel, post) = tokio::join!(
            f.coordinator.cancel(&d.id),
            f.coordinator.post_now(&d.id),
        );
        let cancel = cancel.unwrap();
        let post = post.unwrap();

        let cancelled = cancel == DecisionOutcome::Cancelled;
        let published = matches!(post, DecisionOutcome::Published { .. });
        assert!(
            cancelled ^ published,
            "exactly one action wins: {:?} vs {:?}",
            cancel,
            post
        );
        assert_eq!(f.publisher.publish_call_count(), if published { 1 } else { 0 });
        assert_eq!(f.store.count_outcomes(&d.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fire_lost_claim_is_silent_noop() {
        let f = setup().await;
        f.coordinator.fire("never-existed").await.unwrap();
        assert_eq!(f.publisher.publish_call_count(), 0);
        assert!(f.notifier.notes().is_empty());
    }

    #[tokio::test]
    async fn test_process_due_publishes_only_due_jobs() {
        let f = setup().await;
        let now = Utc::now();

        let due = draft("due", Some(now.timestamp() + 7200));
        let future = draft("future", Some(now.timestamp() + 14400));
        for d in [&due, &future] {
            f.coordinator.submit(d).await.unwrap();
            f.coordinator
                .decide(&d.id, "U_REVIEWER", Decision::Approve)
                .await
                .unwrap();
        }

        // Only the first is due when the poller looks
        let poll_time = now + Duration::hours(2) + Duration::seconds(1);
        let count = f.coordinator.process_due(poll_time).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(f.publisher.published()[0].text, "due");

        let none_due = f.coordinator.process_due(poll_time).await.unwrap();
        assert_eq!(none_due, 0, "claimed jobs are gone");
    }

    #[tokio::test]
    async fn test_sweep_expired_claims_stale_jobs() {
        let f = setup().await;
        let now = Utc::now();

        let d = draft("missed", Some(now.timestamp() + 60));
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        // Two days later with a 1-day horizon: the job is stale
        let later = now + Duration::days(2);
        let expired = f
            .coordinator
            .sweep_expired(later, Duration::days(1))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        assert_eq!(f.publisher.publish_call_count(), 0);

        let outcome = f.store.get_outcome(&d.id).await.unwrap().unwrap();
        assert_eq!(outcome.status, DraftStatus::Expired);
        let notes = f.notifier.notes();
        assert!(notes.iter().any(|(_, text)| text.contains("expired")));
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_due_jobs_for_publisher() {
        let f = setup().await;
        let now = Utc::now();

        let d = draft("fresh", Some(now.timestamp() + 60));
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        // Due but inside the horizon: sweep leaves it, process_due takes it
        let later = now + Duration::minutes(5);
        assert_eq!(
            f.coordinator
                .sweep_expired(later, Duration::hours(24))
                .await
                .unwrap(),
            0
        );
        assert_eq!(f.coordinator.process_due(later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_outcome_per_draft() {
        let f = setup().await;
        let d = draft("single outcome", None);
        f.coordinator.submit(&d).await.unwrap();
        f.coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        // Losing paths cannot add a second outcome
        assert_eq!(
            f.coordinator.cancel(&d.id).await.unwrap(),
            DecisionOutcome::AlreadyProcessed
        );
        assert_eq!(
            f.coordinator
                .decide(&d.id, "U_OTHER", Decision::Reject)
                .await
                .unwrap(),
            DecisionOutcome::AlreadyProcessed
        );
        assert_eq!(f.store.count_outcomes(&d.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_changes_refresh_attached_views() {
        let f = setup().await;
        let renderer = Arc::new(crate::views::mock::MockRenderer::new());
        let sync = crate::views::ListViewSynchronizer::new(
            Arc::clone(&f.store),
            f.coordinator.registry().clone(),
            f.coordinator.ledger().clone(),
            renderer.clone() as Arc<dyn crate::views::ViewRenderer>,
        );
        let coordinator = f.coordinator.clone().with_views(sync.clone());

        sync.open(&ViewRef::new("C1", "1.1")).await.unwrap();

        let d = draft("visible", None);
        coordinator.submit(&d).await.unwrap();
        assert_eq!(renderer.push_count(), 1);
        assert!(renderer.pushes()[0].1.contains("1 pending approval"));

        coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await
            .unwrap();

        // The post-decision refresh finds nothing in flight, finalizes the
        // view, and retires it
        let pushes = renderer.pushes();
        assert!(pushes.last().unwrap().1.contains("All processed"));
        assert!(f.store.list_views().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_still_refreshes_views() {
        let f = setup_with(
            MockPublisher::failure(PublishError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Arc::new(NullScheduler),
            true,
        )
        .await;
        let renderer = Arc::new(crate::views::mock::MockRenderer::new());
        let sync = crate::views::ListViewSynchronizer::new(
            Arc::clone(&f.store),
            f.coordinator.registry().clone(),
            f.coordinator.ledger().clone(),
            renderer.clone() as Arc<dyn crate::views::ViewRenderer>,
        );
        let coordinator = f.coordinator.clone().with_views(sync.clone());

        sync.open(&ViewRef::new("C1", "1.1")).await.unwrap();

        let d = draft("unlucky", None);
        coordinator.submit(&d).await.unwrap();
        assert!(renderer.pushes()[0].1.contains("1 pending approval"));

        let result = coordinator
            .decide(&d.id, "U_REVIEWER", Decision::Approve)
            .await;
        assert!(matches!(result, Err(DraftgateError::Publish(_))));

        // The draft was consumed even though the publish failed, so the
        // refresh finds nothing in flight and finalizes the view.
        let pushes = renderer.pushes();
        assert!(pushes.last().unwrap().1.contains("All processed"));
        assert!(f.store.list_views().await.unwrap().is_empty());
    }
}
