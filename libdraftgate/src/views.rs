//! List view synchronization
//!
//! Every open status view must show the same union of pending-approval and
//! scheduled drafts. `reconcile` reads one snapshot per pass and applies it
//! uniformly to all live views; per-view push failures retire only that
//! view, and views retire on a fixed TTL regardless of activity.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use crate::approvals::ApprovalRegistry;
use crate::error::Result;
use crate::ledger::ScheduleLedger;
use crate::store::RecordStore;
use crate::types::{ApprovalRecord, ScheduledJob, ViewRef};

/// Fixed view lifetime: 24 hours from creation, never refreshed.
pub const VIEW_TTL_SECS: i64 = 24 * 3600;

/// One item of active work, as shown in a status view.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Pending(ApprovalRecord),
    Scheduled(ScheduledJob),
}

/// A rendered view body, produced once per reconcile pass and pushed to
/// every live view unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPayload {
    pub text: String,
}

/// Result of pushing to a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The surface no longer exists (message deleted, channel gone).
    Gone,
}

/// Renders active work into a payload and delivers payloads to views.
/// Rendering must be side-effect free; only `push` touches the outside.
#[async_trait]
pub trait ViewRenderer: Send + Sync {
    fn render(&self, work: &[WorkItem]) -> ViewPayload;

    async fn push(&self, view: &ViewRef, payload: &ViewPayload) -> Result<PushOutcome>;
}

/// Delivers one-off completion and failure notices to a draft's origin view.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, view: &ViewRef, text: &str) -> Result<PushOutcome>;
}

#[derive(Clone)]
pub struct ListViewSynchronizer {
    store: Arc<RecordStore>,
    registry: ApprovalRegistry,
    ledger: ScheduleLedger,
    renderer: Arc<dyn ViewRenderer>,
    ttl_secs: i64,
}

impl ListViewSynchronizer {
    pub fn new(
        store: Arc<RecordStore>,
        registry: ApprovalRegistry,
        ledger: ScheduleLedger,
        renderer: Arc<dyn ViewRenderer>,
    ) -> Self {
        Self {
            store,
            registry,
            ledger,
            renderer,
            ttl_secs: VIEW_TTL_SECS,
        }
    }

    /// Override the view TTL. Intended for tests and short-lived demo
    /// setups; production views live for the full 24 hours.
    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Register a status view. Re-opening an existing view keeps the
    /// original expiry.
    pub async fn open(&self, view: &ViewRef) -> Result<()> {
        self.open_at(view, Utc::now().timestamp()).await
    }

    pub async fn open_at(&self, view: &ViewRef, now: i64) -> Result<()> {
        self.store.put_view(view, now + self.ttl_secs).await?;
        debug!(view = %view.composite_id(), "list view opened");
        Ok(())
    }

    /// Synchronize every live view with the current active work.
    pub async fn reconcile(&self) -> Result<()> {
        self.reconcile_at(Utc::now().timestamp()).await
    }

    /// Reconcile against an explicit clock. One snapshot of active work is
    /// read per call and applied uniformly to all live views; a failure to
    /// read the snapshot aborts the pass with no views touched.
    pub async fn reconcile_at(&self, now: i64) -> Result<()> {
        let mut pending = self.registry.list().await?;
        let mut jobs = self.ledger.list().await?;

        // Deterministic display order: submissions oldest first, then
        // scheduled jobs soonest first.
        pending.sort_by(|a, b| {
            (a.created_at, a.draft.id.as_str()).cmp(&(b.created_at, b.draft.id.as_str()))
        });
        jobs.sort_by(|a, b| (a.fire_at, a.job_id.as_str()).cmp(&(b.fire_at, b.job_id.as_str())));

        let work: Vec<WorkItem> = pending
            .into_iter()
            .map(WorkItem::Pending)
            .chain(jobs.into_iter().map(WorkItem::Scheduled))
            .collect();

        let views = self.store.list_views().await?;
        let (expired, live): (Vec<_>, Vec<_>) =
            views.into_iter().partition(|v| now >= v.expire_at);

        for view in expired {
            // The external message the view referenced is left as-is, stale.
            debug!(view = %view.id, "retiring expired list view");
            let _ = self.store.delete_view(&view.id).await;
        }

        let payload = self.renderer.render(&work);

        if work.is_empty() {
            // Nothing left in flight: finalize every live view and retire
            // it, whether or not the final push landed.
            for view in live {
                let _ = self.renderer.push(&view.view_ref(), &payload).await;
                let _ = self.store.delete_view(&view.id).await;
            }
            return Ok(());
        }

        for view in live {
            match self.renderer.push(&view.view_ref(), &payload).await {
                Ok(PushOutcome::Delivered) => {}
                Ok(PushOutcome::Gone) | Err(_) => {
                    // The surface was deleted externally; drop only this
                    // entry and keep going.
                    info!(view = %view.id, "view gone, retiring entry");
                    let _ = self.store.delete_view(&view.id).await;
                }
            }
        }

        Ok(())
    }
}

/// Plain-text renderer for the CLI surfaces: writes each push to stdout
/// under a view header.
pub struct TextRenderer;

impl TextRenderer {
    fn format_item(item: &WorkItem) -> String {
        match item {
            WorkItem::Pending(record) => format!(
                "[pending]   {}  @{}  {}",
                &record.draft.id[..8.min(record.draft.id.len())],
                record.draft.author_id,
                record.draft.text,
            ),
            WorkItem::Scheduled(job) => {
                let fire_at = Utc
                    .timestamp_opt(job.fire_at, 0)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| job.fire_at.to_string());
                format!(
                    "[scheduled] {}  @{}  {}  fires {}",
                    &job.draft.id[..8.min(job.draft.id.len())],
                    job.draft.author_id,
                    job.draft.text,
                    fire_at,
                )
            }
        }
    }
}

#[async_trait]
impl ViewRenderer for TextRenderer {
    fn render(&self, work: &[WorkItem]) -> ViewPayload {
        if work.is_empty() {
            return ViewPayload {
                text: "No drafts pending or scheduled. All processed.".to_string(),
            };
        }

        let pending = work
            .iter()
            .filter(|w| matches!(w, WorkItem::Pending(_)))
            .count();
        let scheduled = work.len() - pending;

        let mut lines = vec![format!(
            "Draft queue: {} pending approval, {} scheduled",
            pending, scheduled
        )];
        lines.extend(work.iter().map(Self::format_item));

        ViewPayload {
            text: lines.join("\n"),
        }
    }

    async fn push(&self, view: &ViewRef, payload: &ViewPayload) -> Result<PushOutcome> {
        println!("--- view {} ---\n{}", view.composite_id(), payload.text);
        Ok(PushOutcome::Delivered)
    }
}

/// Notifier for the CLI surfaces: prints notices to stdout.
pub struct TextNotifier;

#[async_trait]
impl Notifier for TextNotifier {
    async fn notify(&self, view: &ViewRef, text: &str) -> Result<PushOutcome> {
        println!("[{}] {}", view.composite_id(), text);
        Ok(PushOutcome::Delivered)
    }
}

// Mock renderer and notifier are available for all builds (not just tests)
// to support integration tests.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Renderer that records pushes and can simulate vanished views.
    pub struct MockRenderer {
        pushes: Mutex<Vec<(String, String)>>,
        gone: Mutex<HashSet<String>>,
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self {
                pushes: Mutex::new(Vec::new()),
                gone: Mutex::new(HashSet::new()),
            }
        }

        /// Simulate external deletion of a view's display surface.
        pub fn mark_gone(&self, view: &ViewRef) {
            self.gone.lock().unwrap().insert(view.composite_id());
        }

        /// All (view id, payload text) pairs pushed so far.
        pub fn pushes(&self) -> Vec<(String, String)> {
            self.pushes.lock().unwrap().clone()
        }

        pub fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }
    }

    impl Default for MockRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ViewRenderer for MockRenderer {
        fn render(&self, work: &[WorkItem]) -> ViewPayload {
            TextRenderer.render(work)
        }

        async fn push(&self, view: &ViewRef, payload: &ViewPayload) -> Result<PushOutcome> {
            let id = view.composite_id();
            if self.gone.lock().unwrap().contains(&id) {
                return Ok(PushOutcome::Gone);
            }
            self.pushes.lock().unwrap().push((id, payload.text.clone()));
            Ok(PushOutcome::Delivered)
        }
    }

    /// Notifier that records every notice.
    pub struct MockNotifier {
        notes: Mutex<Vec<(String, String)>>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self {
                notes: Mutex::new(Vec::new()),
            }
        }

        pub fn notes(&self) -> Vec<(String, String)> {
            self.notes.lock().unwrap().clone()
        }
    }

    impl Default for MockNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, view: &ViewRef, text: &str) -> Result<PushOutcome> {
            self.notes
                .lock()
                .unwrap()
                .push((view.composite_id(), text.to_string()));
            Ok(PushOutcome::Delivered)
        }
    }
}
