#![allow(clippy::missing_docs_in_private_items)]

pub mod chunker;
pub mod extract;
pub mod normalize;
pub mod pipeline;

use chrono::Utc;
use common::storage::{
    db::SurrealDbClient,
    types::{
        ingestion_task::{IngestionTask, TaskErrorInfo, DEFAULT_LEASE_SECS},
        source::Source,
    },
};
pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionTuning};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One claim loop: pull the next runnable task, process it, repeat. The
/// lease passed to the claim doubles as the visibility timeout, so a worker
/// that dies mid-task gets its work redelivered. `task_time_limit` is the
/// hard per-task ceiling; a task still running past it is cancelled, dead
/// lettered, and its source marked failed.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    ingestion_pipeline: Arc<IngestionPipeline>,
    lease_secs: u64,
    task_time_limit_secs: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let worker_id = format!("ingestion-worker-{}", Uuid::new_v4());
    let lease_duration = Duration::from_secs(lease_secs.max(DEFAULT_LEASE_SECS as u64 / 4));
    let task_time_limit = Duration::from_secs(task_time_limit_secs.max(1));
    let idle_backoff = Duration::from_millis(500);

    loop {
        match IngestionTask::claim_next_ready(&db, &worker_id, Utc::now(), lease_duration).await {
            Ok(Some(task)) => {
                let task_id = task.id.clone();
                info!(
                    %worker_id,
                    %task_id,
                    attempt = task.attempts,
                    "claimed ingestion task"
                );

                let cancelled = task.clone();
                match timeout(task_time_limit, ingestion_pipeline.process_task(task)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!(%worker_id, %task_id, error = %err, "ingestion task failed");
                    }
                    Err(_) => {
                        error!(
                            %worker_id,
                            %task_id,
                            limit_secs = task_time_limit.as_secs(),
                            "ingestion task exceeded the hard time limit; cancelled"
                        );
                        let message = format!(
                            "ingestion exceeded the {}s worker time limit",
                            task_time_limit.as_secs()
                        );
                        if let Err(err) = cancelled
                            .mark_failed(
                                TaskErrorInfo {
                                    message: message.clone(),
                                },
                                Duration::from_secs(0),
                                false,
                                &db,
                            )
                            .await
                        {
                            error!(%task_id, error = %err, "failed to dead-letter timed out task");
                        }
                        if let Err(err) =
                            Source::mark_failed(&cancelled.source_id, &message, &db).await
                        {
                            error!(%task_id, error = %err, "failed to mark source failed");
                        }
                    }
                }
            }
            Ok(None) => {
                sleep(idle_backoff).await;
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim ingestion task");
                warn!("Backing off for 1s after claim error");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Spawn `concurrency` claim loops against the same queue.
pub async fn run_workers(
    db: Arc<SurrealDbClient>,
    ingestion_pipeline: Arc<IngestionPipeline>,
    concurrency: usize,
    lease_secs: u64,
    task_time_limit_secs: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut handles = Vec::new();
    for _ in 0..concurrency.max(1) {
        let db = Arc::clone(&db);
        let pipeline = Arc::clone(&ingestion_pipeline);
        handles.push(tokio::spawn(async move {
            if let Err(err) = run_worker_loop(db, pipeline, lease_secs, task_time_limit_secs).await
            {
                error!(error = %err, "worker loop exited");
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
