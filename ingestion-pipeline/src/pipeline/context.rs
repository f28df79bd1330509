use common::{
    error::AppError,
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{chunk::DocumentChunk, ingestion_task::IngestionTask, source::Source},
    },
    utils::config::AppConfig,
};
use tracing::warn;

use crate::{chunker::ChunkPiece, normalize::CleanedDocument};

use super::config::IngestionConfig;

/// Mutable state threaded through the pipeline stages for one task.
pub struct PipelineContext<'a> {
    pub task_id: String,
    pub attempt: u32,
    pub source_id: String,
    pub db: &'a SurrealDbClient,
    pub provider: &'a AiProvider,
    pub storage: &'a StorageManager,
    pub app_config: &'a AppConfig,
    pub pipeline_config: &'a IngestionConfig,
    pub source: Option<Source>,
    pub cleaned: Option<CleanedDocument>,
    pub pieces: Vec<ChunkPiece>,
    pub rows: Vec<(DocumentChunk, Vec<f32>)>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        task: &IngestionTask,
        db: &'a SurrealDbClient,
        provider: &'a AiProvider,
        storage: &'a StorageManager,
        app_config: &'a AppConfig,
        pipeline_config: &'a IngestionConfig,
    ) -> Self {
        Self {
            task_id: task.id.clone(),
            attempt: task.attempts,
            source_id: task.source_id.clone(),
            db,
            provider,
            storage,
            app_config,
            pipeline_config,
            source: None,
            cleaned: None,
            pieces: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn source(&self) -> Result<&Source, AppError> {
        self.source
            .as_ref()
            .ok_or_else(|| AppError::InternalError("source missing before extraction".into()))
    }

    pub fn cleaned(&self) -> Result<&CleanedDocument, AppError> {
        self.cleaned
            .as_ref()
            .ok_or_else(|| AppError::InternalError("cleaned text missing before chunking".into()))
    }

    /// Log the failure and hand the error back for the caller's retry logic.
    pub fn abort(&mut self, err: AppError) -> AppError {
        warn!(
            task_id = %self.task_id,
            attempt = self.attempt,
            source_id = %self.source_id,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
