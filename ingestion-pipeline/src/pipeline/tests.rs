use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use common::{
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{
            chunk::DocumentChunk,
            ingestion_task::{IngestionTask, IngestionTaskStatus},
            source::{Source, SourceStatus, SourceType},
        },
    },
    utils::config::{AiProviderKind, AppConfig},
};
use uuid::Uuid;

use super::{IngestionConfig, IngestionPipeline};

async fn test_setup(chunk_target: usize, chunk_overlap: usize) -> (Arc<SurrealDbClient>, StorageManager, AppConfig) {
    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb"),
    );

    let mut config = AppConfig::for_tests("unused");
    config.ai_provider = AiProviderKind::Fake;
    config.chunk_char_target = chunk_target;
    config.chunk_char_overlap = chunk_overlap;
    config.embed_dim = 32;

    db.ensure_initialized(config.embed_dim)
        .await
        .expect("initialize indexes");

    (db, StorageManager::memory(), config)
}

fn pipeline_for(
    db: &Arc<SurrealDbClient>,
    storage: &StorageManager,
    config: &AppConfig,
) -> IngestionPipeline {
    IngestionPipeline::new_with_config(
        Arc::clone(db),
        Arc::new(AiProvider::from_config(config)),
        storage.clone(),
        config.clone(),
        IngestionConfig::default(),
    )
}

async fn stored_text_source(
    db: &SurrealDbClient,
    storage: &StorageManager,
    body: &str,
) -> Source {
    let source = Source::new("Test source".into(), SourceType::Text, String::new());
    storage
        .put_source_bytes(&source.id, "txt", Bytes::from(body.as_bytes().to_vec()))
        .await
        .expect("store bytes");
    db.store_item(source.clone()).await.expect("store source");
    source
}

async fn claim_one(db: &SurrealDbClient) -> IngestionTask {
    IngestionTask::claim_next_ready(db, "test-worker", Utc::now(), Duration::from_secs(60))
        .await
        .expect("claim")
        .expect("task available")
}

#[tokio::test]
async fn text_source_reaches_ready_with_chunks_and_embeddings() {
    let (db, storage, config) = test_setup(200, 40).await;
    let pipeline = pipeline_for(&db, &storage, &config);

    let body = "The study follows river trade across three centuries. ".repeat(20);
    let source = stored_text_source(&db, &storage, &body).await;
    IngestionTask::enqueue(&source.id, &db).await.expect("enqueue");

    let task = claim_one(&db).await;
    pipeline.process_task(task).await.expect("process");

    let stored = Source::get_required(&source.id, &db).await.expect("source");
    assert_eq!(stored.status, SourceStatus::Ready);
    assert!(stored.error.is_none());

    let chunks = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");
    assert!(chunks.len() > 1, "long body should produce several chunks");

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.ordinal as usize, i);
    }
}

#[tokio::test]
async fn stored_chunks_reconstruct_the_cleaned_text() {
    let (db, storage, config) = test_setup(180, 30).await;
    let pipeline = pipeline_for(&db, &storage, &config);

    let body = "Alpha beta gamma delta epsilon. Zeta eta theta iota kappa. ".repeat(15);
    let source = stored_text_source(&db, &storage, &body).await;
    IngestionTask::enqueue(&source.id, &db).await.expect("enqueue");

    let task = claim_one(&db).await;
    pipeline.process_task(task).await.expect("process");

    let chunks = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");
    let cleaned = crate::normalize::normalize_whitespace(&body);

    let mut rebuilt = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(
            crate::normalize::char_slice(&cleaned, chunk.char_start, chunk.char_end),
            chunk.text,
            "chunk offsets must slice back to the cleaned text"
        );
        if i == 0 {
            rebuilt.push_str(&chunk.text);
        } else {
            let overlap = chunks[i - 1].char_end - chunk.char_start;
            rebuilt.extend(chunk.text.chars().skip(overlap));
        }
    }
    assert_eq!(rebuilt, cleaned);
}

#[tokio::test]
async fn reprocessing_replaces_chunks_instead_of_appending() {
    let (db, storage, config) = test_setup(200, 40).await;
    let pipeline = pipeline_for(&db, &storage, &config);

    let body = "Replayable content about canals and aqueducts. ".repeat(12);
    let source = stored_text_source(&db, &storage, &body).await;

    IngestionTask::enqueue(&source.id, &db).await.expect("enqueue");
    let task = claim_one(&db).await;
    pipeline.process_task(task).await.expect("first run");

    let first = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");

    // A redelivered task for the same source must converge on the same rows.
    // Ready sources are not claimable, so reset to Processing as a stalled
    // first run would have left it.
    db.query("UPDATE type::thing('source', $id) SET status = $status")
        .bind(("id", source.id.clone()))
        .bind(("status", SourceStatus::Processing))
        .await
        .expect("reset status")
        .check()
        .expect("reset status check");

    IngestionTask::enqueue(&source.id, &db).await.expect("re-enqueue");
    let task = claim_one(&db).await;
    pipeline.process_task(task).await.expect("second run");

    let second = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");
    assert_eq!(first.len(), second.len());
}

#[tokio::test]
async fn oversized_text_fails_the_source_without_retry() {
    let (db, storage, mut config) = test_setup(200, 40).await;
    config.max_text_bytes = 64;
    let pipeline = pipeline_for(&db, &storage, &config);

    let body = "far too much text for the configured cap ".repeat(10);
    let source = stored_text_source(&db, &storage, &body).await;
    IngestionTask::enqueue(&source.id, &db).await.expect("enqueue");

    let task = claim_one(&db).await;
    let task_id = task.id.clone();
    let result = pipeline.process_task(task).await;
    assert!(result.is_err());

    let stored = Source::get_required(&source.id, &db).await.expect("source");
    assert_eq!(stored.status, SourceStatus::Failed);
    assert!(stored
        .error
        .as_deref()
        .expect("error message")
        .contains("cap"));

    // Validation failures dead-letter on the first attempt.
    let job: Option<IngestionTask> = db.get_item(&task_id).await.expect("job");
    assert_eq!(
        job.expect("job row").status,
        IngestionTaskStatus::DeadLetter
    );
}

#[tokio::test]
async fn task_for_deleted_source_is_dropped_cleanly() {
    let (db, storage, config) = test_setup(200, 40).await;
    let pipeline = pipeline_for(&db, &storage, &config);

    let task = IngestionTask::new("no-such-source".into());
    db.store_item(task.clone()).await.expect("store task");

    let claimed = claim_one(&db).await;
    pipeline.process_task(claimed).await.expect("process");

    let job: Option<IngestionTask> = db.get_item(&task.id).await.expect("job");
    assert_eq!(job.expect("job row").status, IngestionTaskStatus::Succeeded);
}

#[tokio::test]
async fn ready_source_is_not_reprocessed() {
    let (db, storage, config) = test_setup(200, 40).await;
    let pipeline = pipeline_for(&db, &storage, &config);

    let body = "Completed source content. ".repeat(10);
    let source = stored_text_source(&db, &storage, &body).await;

    IngestionTask::enqueue(&source.id, &db).await.expect("enqueue");
    let task = claim_one(&db).await;
    pipeline.process_task(task).await.expect("first run");

    let chunks_before = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");

    // A stale duplicate task arrives after the source is Ready.
    IngestionTask::enqueue(&source.id, &db).await.expect("dup enqueue");
    let dup = claim_one(&db).await;
    pipeline.process_task(dup).await.expect("duplicate run");

    let chunks_after = DocumentChunk::list_for_source(&source.id, &db)
        .await
        .expect("chunks");
    let before_ids: Vec<&str> = chunks_before.iter().map(|c| c.id.as_str()).collect();
    let after_ids: Vec<&str> = chunks_after.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(before_ids, after_ids, "chunks must be untouched");
}
