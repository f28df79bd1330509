use chrono::Duration as ChronoDuration;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

pub const MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LEASE_SECS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionTaskStatus {
    Queued,
    Processing,
    Succeeded,
    DeadLetter,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskErrorInfo {
    pub message: String,
}

stored_object!(IngestionTask, "ingestion_job", {
    source_id: String,
    status: IngestionTaskStatus,
    attempts: u32,
    worker_id: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    lease_expires_at: Option<DateTime<Utc>>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    next_attempt_at: Option<DateTime<Utc>>,
    error: Option<TaskErrorInfo>
});

impl IngestionTask {
    pub fn new(source_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            source_id,
            status: IngestionTaskStatus::Queued,
            attempts: 0,
            worker_id: None,
            lease_expires_at: None,
            next_attempt_at: None,
            error: None,
        }
    }

    /// Enqueue a task for a source and return its id.
    pub async fn enqueue(source_id: &str, db: &SurrealDbClient) -> Result<String, AppError> {
        let task = Self::new(source_id.to_string());
        let id = task.id.clone();
        db.store_item(task).await?;
        Ok(id)
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < MAX_ATTEMPTS
    }

    /// Claim the oldest runnable task: queued and due, or processing past its
    /// lease (a worker died mid-task). Compare-and-swap so two workers never
    /// hold the same task; the lease is the visibility timeout that makes
    /// delivery at-least-once.
    pub async fn claim_next_ready(
        db: &SurrealDbClient,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: std::time::Duration,
    ) -> Result<Option<Self>, AppError> {
        let lease_until =
            now + ChronoDuration::seconds(i64::try_from(lease.as_secs()).unwrap_or(DEFAULT_LEASE_SECS));

        let mut candidates_response = db
            .query(
                "SELECT * FROM ingestion_job
                 WHERE (status = $queued AND (next_attempt_at = NONE OR next_attempt_at <= $now))
                    OR (status = $processing AND lease_expires_at != NONE AND lease_expires_at <= $now)
                 ORDER BY created_at ASC
                 LIMIT 5",
            )
            .bind(("queued", IngestionTaskStatus::Queued))
            .bind(("processing", IngestionTaskStatus::Processing))
            .bind(("now", surrealdb::sql::Datetime::from(now)))
            .await?;

        let candidates: Vec<Self> = candidates_response.take(0)?;

        for candidate in candidates {
            let mut response = db
                .query(
                    "UPDATE type::thing('ingestion_job', $id)
                     SET status = $processing,
                         worker_id = $worker_id,
                         attempts = attempts + 1,
                         lease_expires_at = $lease_until,
                         updated_at = time::now()
                     WHERE (status = $queued AND (next_attempt_at = NONE OR next_attempt_at <= $now))
                        OR (status = $processing AND lease_expires_at != NONE AND lease_expires_at <= $now)
                     RETURN AFTER",
                )
                .bind(("id", candidate.id.clone()))
                .bind(("queued", IngestionTaskStatus::Queued))
                .bind(("processing", IngestionTaskStatus::Processing))
                .bind(("worker_id", worker_id.to_string()))
                .bind(("now", surrealdb::sql::Datetime::from(now)))
                .bind(("lease_until", surrealdb::sql::Datetime::from(lease_until)))
                .await?;

            let claimed: Vec<Self> = response.take(0)?;
            if let Some(task) = claimed.into_iter().next() {
                return Ok(Some(task));
            }
            // Lost the race for this candidate; try the next one.
        }

        Ok(None)
    }

    pub async fn mark_succeeded(&self, db: &SurrealDbClient) -> Result<(), AppError> {
        db.query(
            "UPDATE type::thing('ingestion_job', $id)
             SET status = $status, lease_expires_at = NONE, updated_at = time::now()",
        )
        .bind(("id", self.id.clone()))
        .bind(("status", IngestionTaskStatus::Succeeded))
        .await?
        .check()?;

        Ok(())
    }

    /// Record a failed attempt. Retryable failures re-queue with a delay;
    /// exhausted or terminal ones land in the dead letter state.
    pub async fn mark_failed(
        &self,
        error: TaskErrorInfo,
        retry_delay: std::time::Duration,
        retryable: bool,
        db: &SurrealDbClient,
    ) -> Result<IngestionTaskStatus, AppError> {
        let status = if retryable && self.can_retry() {
            IngestionTaskStatus::Queued
        } else {
            IngestionTaskStatus::DeadLetter
        };

        let next_attempt_at = (status == IngestionTaskStatus::Queued).then(|| {
            surrealdb::sql::Datetime::from(
                Utc::now()
                    + ChronoDuration::seconds(i64::try_from(retry_delay.as_secs()).unwrap_or(0)),
            )
        });

        db.query(
            "UPDATE type::thing('ingestion_job', $id)
             SET status = $status,
                 error = $error,
                 lease_expires_at = NONE,
                 next_attempt_at = $next_attempt_at,
                 updated_at = time::now()",
        )
        .bind(("id", self.id.clone()))
        .bind(("status", status))
        .bind(("error", error))
        .bind(("next_attempt_at", next_attempt_at))
        .await?
        .check()?;

        Ok(status)
    }
}
