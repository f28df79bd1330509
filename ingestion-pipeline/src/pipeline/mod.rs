mod config;
mod context;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{
            ingestion_task::{IngestionTask, IngestionTaskStatus, TaskErrorInfo},
            source::Source,
        },
    },
    utils::config::AppConfig,
};
use tracing::{debug, info, warn};

use self::{
    context::PipelineContext,
    stages::{chunk_content, embed_chunks, extract_content, persist_chunks},
    state::ready,
};

/// Drives one source through extract → chunk → embed → persist and owns the
/// retry/dead-letter bookkeeping around it. Stage transitions are enforced
/// by a typestate machine so a stage cannot run out of order.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    provider: Arc<AiProvider>,
    storage: StorageManager,
    app_config: AppConfig,
    pipeline_config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        provider: Arc<AiProvider>,
        storage: StorageManager,
        app_config: AppConfig,
    ) -> Self {
        Self::new_with_config(db, provider, storage, app_config, IngestionConfig::default())
    }

    pub fn new_with_config(
        db: Arc<SurrealDbClient>,
        provider: Arc<AiProvider>,
        storage: StorageManager,
        app_config: AppConfig,
        pipeline_config: IngestionConfig,
    ) -> Self {
        Self {
            db,
            provider,
            storage,
            app_config,
            pipeline_config,
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            task_id = %task.id,
            attempt = task.attempts,
            worker_id = task.worker_id.as_deref().unwrap_or("unknown-worker"),
            source_id = %task.source_id
        )
    )]
    pub async fn process_task(&self, task: IngestionTask) -> Result<(), AppError> {
        // A deleted source cascades its job rows away, but the task we hold
        // may predate the delete. Nothing to do.
        let source: Option<Source> = self.db.get_item(&task.source_id).await?;
        if source.is_none() {
            info!(task_id = %task.id, "source row is gone; dropping task");
            task.mark_succeeded(&self.db).await?;
            return Ok(());
        }

        // The status gate is the idempotency boundary: when the source is
        // already Ready or Failed another worker finished it.
        if !Source::mark_processing(&task.source_id, &self.db).await? {
            info!(task_id = %task.id, "source is not claimable; dropping task");
            task.mark_succeeded(&self.db).await?;
            return Ok(());
        }

        match self.drive_pipeline(&task).await.map_err(|err| {
            debug!(
                task_id = %task.id,
                attempt = task.attempts,
                error = %err,
                "ingestion pipeline failed"
            );
            err
        }) {
            Ok(()) => {
                task.mark_succeeded(&self.db).await?;
                info!(
                    task_id = %task.id,
                    attempt = task.attempts,
                    "ingestion task succeeded"
                );
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                let retryable = err.is_retryable();
                let error_info = TaskErrorInfo {
                    message: reason.clone(),
                };

                let delay = self.retry_delay(task.attempts);
                let status = task
                    .mark_failed(error_info, delay, retryable, &self.db)
                    .await?;

                match status {
                    IngestionTaskStatus::Queued => {
                        warn!(
                            task_id = %task.id,
                            attempt = task.attempts,
                            retry_in_secs = delay.as_secs(),
                            "ingestion task failed; scheduled retry"
                        );
                    }
                    _ => {
                        // Out of attempts (or a terminal error): the failure
                        // becomes visible on the source row.
                        Source::mark_failed(&task.source_id, &reason, &self.db).await?;
                        warn!(
                            task_id = %task.id,
                            attempt = task.attempts,
                            "ingestion task failed terminally; source marked failed"
                        );
                    }
                }

                Err(AppError::Processing(reason))
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let tuning = &self.pipeline_config.tuning;
        let capped_attempt = attempt
            .saturating_sub(1)
            .min(tuning.retry_backoff_cap_exponent);
        let multiplier = 2_u64.pow(capped_attempt);
        let delay = tuning.retry_base_delay_secs.saturating_mul(multiplier);

        Duration::from_secs(delay.min(tuning.retry_max_delay_secs))
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    #[tracing::instrument(
        skip_all,
        fields(task_id = %task.id, attempt = task.attempts, source_id = %task.source_id)
    )]
    async fn drive_pipeline(&self, task: &IngestionTask) -> Result<(), AppError> {
        let mut ctx = PipelineContext::new(
            task,
            self.db.as_ref(),
            self.provider.as_ref(),
            &self.storage,
            &self.app_config,
            &self.pipeline_config,
        );

        let machine = ready();
        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = extract_content(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = chunk_content(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
        let chunk_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = embed_chunks(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let embed_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = persist_chunks(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        info!(
            task_id = %ctx.task_id,
            attempt = ctx.attempt,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            extract_ms = Self::duration_millis(extract_duration),
            chunk_ms = Self::duration_millis(chunk_duration),
            embed_ms = Self::duration_millis(embed_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "ingestion pipeline finished"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests;
