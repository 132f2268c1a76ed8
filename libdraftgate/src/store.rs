//! Persistent record store for Draftgate
//!
//! All coordination between concurrent reviewer actions and timer fires goes
//! through this store. The take_* operations are single
//! `DELETE ... RETURNING` statements: whoever gets the row back owns the
//! draft, everyone else gets `None`. Never read-check-delete.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{
    ApprovalRecord, Draft, DraftOutcome, DraftStatus, ListViewEntry, ScheduledJob, ViewRef,
};

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (creating if necessary) the store at the given path and run
    /// migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on all platforms;
        // mode=rwc creates the file if missing.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // pending_approvals
    // ------------------------------------------------------------------

    /// Insert a pending approval record. Fails if the draft id is already
    /// present.
    pub async fn put_pending(&self, record: &ApprovalRecord) -> Result<()> {
        let media_refs = serde_json::to_string(&record.draft.media_refs)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_approvals
                (id, draft_text, author_id, media_refs, scheduled_at,
                 origin_channel, origin_location, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.draft.id)
        .bind(&record.draft.text)
        .bind(&record.draft.author_id)
        .bind(media_refs)
        .bind(record.draft.scheduled_at)
        .bind(&record.draft.origin.channel)
        .bind(&record.draft.origin.location)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(crate::error::DraftgateError::AlreadyExists(
                    record.draft.id.clone(),
                ))
            }
            Err(e) => Err(StoreError::SqlxError(e).into()),
        }
    }

    /// Get a pending approval record without removing it.
    pub async fn get_pending(&self, draft_id: &str) -> Result<Option<ApprovalRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, draft_text, author_id, media_refs, scheduled_at,
                   origin_channel, origin_location, created_at
            FROM pending_approvals WHERE id = ?
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(approval_from_row).transpose()
    }

    /// List all pending approval records (unordered).
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, draft_text, author_id, media_refs, scheduled_at,
                   origin_channel, origin_location, created_at
            FROM pending_approvals
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(approval_from_row).collect()
    }

    /// Atomically remove and return a pending approval record. At most one
    /// concurrent caller gets `Some`; the rest see `None`.
    pub async fn take_pending(&self, draft_id: &str) -> Result<Option<ApprovalRecord>> {
        let row = sqlx::query(
            r#"
            DELETE FROM pending_approvals WHERE id = ?
            RETURNING id, draft_text, author_id, media_refs, scheduled_at,
                      origin_channel, origin_location, created_at
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(approval_from_row).transpose()
    }

    // ------------------------------------------------------------------
    // scheduled_jobs
    // ------------------------------------------------------------------

    /// Insert a scheduled job row carrying the serialized draft payload.
    pub async fn put_job(&self, job: &ScheduledJob) -> Result<()> {
        let payload = serde_json::to_string(&job.draft)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (job_id, draft_id, fire_at, payload, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.draft.id)
        .bind(job.fire_at)
        .bind(payload)
        .bind(job.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(crate::error::DraftgateError::AlreadyExists(
                    job.job_id.clone(),
                ))
            }
            Err(e) => Err(StoreError::SqlxError(e).into()),
        }
    }

    /// List all live scheduled jobs (unordered).
    pub async fn list_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, draft_id, fire_at, payload, created_at
            FROM scheduled_jobs
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(job_from_row).collect()
    }

    /// List jobs whose fire time has arrived, soonest first.
    pub async fn due_jobs(&self, now: i64) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, draft_id, fire_at, payload, created_at
            FROM scheduled_jobs
            WHERE fire_at <= ?
            ORDER BY fire_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(job_from_row).collect()
    }

    /// Look up the live job for a draft, if any.
    pub async fn find_job_by_draft(&self, draft_id: &str) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            r#"
            SELECT job_id, draft_id, fire_at, payload, created_at
            FROM scheduled_jobs WHERE draft_id = ?
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(job_from_row).transpose()
    }

    /// Atomically remove and return a scheduled job. The dedup primitive:
    /// exactly one of any set of concurrent claimants gets `Some`.
    pub async fn take_job(&self, job_id: &str) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            r#"
            DELETE FROM scheduled_jobs WHERE job_id = ?
            RETURNING job_id, draft_id, fire_at, payload, created_at
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(job_from_row).transpose()
    }

    // ------------------------------------------------------------------
    // list_views
    // ------------------------------------------------------------------

    /// Register a list view. If the view id already exists the original
    /// row, including its expiry, is kept untouched.
    pub async fn put_view(&self, view: &ViewRef, expire_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO list_views (id, channel, location, expire_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(view.composite_id())
        .bind(&view.channel)
        .bind(&view.location)
        .bind(expire_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn list_views(&self) -> Result<Vec<ListViewEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel, location, expire_at FROM list_views
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| ListViewEntry {
                id: r.get("id"),
                channel: r.get("channel"),
                location: r.get("location"),
                expire_at: r.get("expire_at"),
            })
            .collect())
    }

    /// Delete a list view entry. Missing rows are fine.
    pub async fn delete_view(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM list_views WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // draft_outcomes
    // ------------------------------------------------------------------

    /// Record the terminal outcome for a draft. The first write wins; a
    /// second write for the same draft is ignored (resolve/claim exclusivity
    /// means it should never happen).
    pub async fn record_outcome(
        &self,
        draft_id: &str,
        status: DraftStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO draft_outcomes (draft_id, status, detail, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (draft_id) DO NOTHING
            "#,
        )
        .bind(draft_id)
        .bind(status.as_str())
        .bind(detail)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_outcome(&self, draft_id: &str) -> Result<Option<DraftOutcome>> {
        let row = sqlx::query(
            r#"
            SELECT draft_id, status, detail, recorded_at
            FROM draft_outcomes WHERE draft_id = ?
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(|r| {
            let status_str: String = r.get("status");
            let status = DraftStatus::from_str(&status_str).ok_or_else(|| {
                StoreError::CorruptRecord(format!("unknown outcome status: {}", status_str))
            })?;
            Ok(DraftOutcome {
                draft_id: r.get("draft_id"),
                status,
                detail: r.get("detail"),
                recorded_at: r.get("recorded_at"),
            })
        })
        .transpose()
    }

    pub async fn count_outcomes(&self, draft_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM draft_outcomes WHERE draft_id = ?")
            .bind(draft_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.get("n"))
    }
}

fn approval_from_row(r: sqlx::sqlite::SqliteRow) -> Result<ApprovalRecord> {
    let media_refs: String = r.get("media_refs");
    let media_refs: Vec<String> = serde_json::from_str(&media_refs)
        .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

    let created_at: i64 = r.get("created_at");

    Ok(ApprovalRecord {
        draft: Draft {
            id: r.get("id"),
            text: r.get("draft_text"),
            author_id: r.get("author_id"),
            media_refs,
            scheduled_at: r.get("scheduled_at"),
            origin: ViewRef::new(
                r.get::<String, _>("origin_channel"),
                r.get::<String, _>("origin_location"),
            ),
            created_at,
        },
        created_at,
    })
}

fn job_from_row(r: sqlx::sqlite::SqliteRow) -> Result<ScheduledJob> {
    let payload: String = r.get("payload");
    let draft: Draft = serde_json::from_str(&payload)
        .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

    Ok(ScheduledJob {
        job_id: r.get("job_id"),
        fire_at: r.get("fire_at"),
        draft,
        created_at: r.get("created_at"),
    })
}
