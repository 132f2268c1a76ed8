//! One-shot timer scheduling
//!
//! The scheduler only arms and disarms timers; ownership of the job stays
//! with the schedule ledger. A fire handler must still `claim` the job
//! before acting, so a timer that fires concurrently with a manual cancel
//! or post-now loses cleanly at the store.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{DraftgateError, Result};

/// Callback invoked with the job id when a registered timer fires.
pub type FireHandler =
    Arc<dyn Fn(String) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync>;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Install the fire callback. Must be called before any timer can fire.
    fn on_fire(&self, handler: FireHandler);

    /// Arm a one-shot timer for the given job.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerUnavailable` if the timer cannot be registered;
    /// the caller must not advance the draft's status in that case.
    async fn register(&self, fire_at: DateTime<Utc>, job_id: &str) -> Result<()>;

    /// Disarm a timer. Best-effort: returns `false` if no timer was armed
    /// for this id (already fired, or registered by another process).
    async fn cancel(&self, job_id: &str) -> Result<bool>;
}

/// In-process scheduler: one tokio task per registration, sleeping until
/// the fire time and then invoking the handler.
///
/// Timers do not survive a restart; durable firing is the draft-send
/// poller's job. Both paths funnel through `claim`, so running them side
/// by side cannot double-fire.
pub struct TokioScheduler {
    handler: Mutex<Option<FireHandler>>,
    tasks: Arc<Mutex<HashMap<String, tokio::task::JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of currently armed timers.
    pub fn armed(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    fn on_fire(&self, handler: FireHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn register(&self, fire_at: DateTime<Utc>, job_id: &str) -> Result<()> {
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                DraftgateError::SchedulerUnavailable("no fire handler installed".to_string())
            })?;

        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let job_id = job_id.to_string();
        let tasks = Arc::clone(&self.tasks);
        let task_id = job_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(job_id = %task_id, "timer fired");
            tasks.lock().unwrap().remove(&task_id);
            (handler)(task_id).await;
        });

        self.tasks.lock().unwrap().insert(job_id, handle);
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool> {
        match self.tasks.lock().unwrap().remove(job_id) {
            Some(handle) => {
                handle.abort();
                debug!(job_id, "timer disarmed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Scheduler for deployments where a polling daemon does all the firing.
/// Registration succeeds without arming anything; cancellation finds
/// nothing to disarm.
pub struct NullScheduler;

#[async_trait]
impl Scheduler for NullScheduler {
    fn on_fire(&self, _handler: FireHandler) {}

    async fn register(&self, fire_at: DateTime<Utc>, job_id: &str) -> Result<()> {
        debug!(job_id, %fire_at, "job left to the poller");
        Ok(())
    }

    async fn cancel(&self, _job_id: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Scheduler that refuses every registration, for exercising the
/// approve-then-schedule failure path.
pub struct UnavailableScheduler;

#[async_trait]
impl Scheduler for UnavailableScheduler {
    fn on_fire(&self, _handler: FireHandler) {}

    async fn register(&self, _fire_at: DateTime<Utc>, job_id: &str) -> Result<()> {
        warn!(job_id, "scheduler registration refused");
        Err(DraftgateError::SchedulerUnavailable(
            "registration refused".to_string(),
        ))
    }

    async fn cancel(&self, _job_id: &str) -> Result<bool> {
        Ok(false)
    }
}
