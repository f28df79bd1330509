use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// What kind of content a source was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Text,
    Url,
}

impl SourceType {
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text | Self::Url => "txt",
        }
    }
}

/// Ingest lifecycle. Only the ingestion pipeline moves a source forward;
/// the only legal transitions are Uploaded→Processing, Processing→Ready and
/// Processing→Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

stored_object!(Source, "source", {
    title: String,
    source_type: SourceType,
    /// Original filename for uploads, the URL for url sources, empty for
    /// pasted text.
    origin: String,
    status: SourceStatus,
    error: Option<String>,
    ingest_task_id: Option<String>
});

impl Source {
    pub fn new(title: String, source_type: SourceType, origin: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            title,
            source_type,
            origin,
            status: SourceStatus::Uploaded,
            error: None,
            ingest_task_id: None,
        }
    }

    pub async fn get_required(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item::<Self>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("source {id} does not exist")))
    }

    /// Claim the source for processing. Returns false when another worker
    /// already owns it (status outside Uploaded/Processing) or the row is
    /// gone, which callers treat as "abort without error".
    pub async fn mark_processing(id: &str, db: &SurrealDbClient) -> Result<bool, AppError> {
        let mut response = db
            .query(
                "UPDATE type::thing('source', $id)
                 SET status = $to, updated_at = time::now()
                 WHERE status INSIDE $allowed
                 RETURN AFTER",
            )
            .bind(("id", id.to_string()))
            .bind(("to", SourceStatus::Processing))
            .bind(("allowed", vec![SourceStatus::Uploaded, SourceStatus::Processing]))
            .await?;

        let updated: Vec<Self> = response.take(0)?;
        Ok(!updated.is_empty())
    }

    pub async fn mark_ready(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.query(
            "UPDATE type::thing('source', $id)
             SET status = $to, error = NONE, updated_at = time::now()
             WHERE status = $from",
        )
        .bind(("id", id.to_string()))
        .bind(("to", SourceStatus::Ready))
        .bind(("from", SourceStatus::Processing))
        .await?
        .check()?;

        Ok(())
    }

    pub async fn mark_failed(
        id: &str,
        message: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.query(
            "UPDATE type::thing('source', $id)
             SET status = $to, error = $message, updated_at = time::now()
             WHERE status INSIDE $allowed",
        )
        .bind(("id", id.to_string()))
        .bind(("to", SourceStatus::Failed))
        .bind(("message", message.to_string()))
        .bind(("allowed", vec![SourceStatus::Uploaded, SourceStatus::Processing]))
        .await?
        .check()?;

        Ok(())
    }

    pub async fn set_ingest_task_id(
        id: &str,
        task_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.query(
            "UPDATE type::thing('source', $id)
             SET ingest_task_id = $task_id, updated_at = time::now()",
        )
        .bind(("id", id.to_string()))
        .bind(("task_id", task_id.to_string()))
        .await?
        .check()?;

        Ok(())
    }

    /// Paged listing with optional status / source-type filters.
    pub async fn list(
        db: &SurrealDbClient,
        limit: usize,
        offset: usize,
        status: Option<SourceStatus>,
        source_type: Option<SourceType>,
    ) -> Result<Vec<Self>, AppError> {
        let mut clauses = Vec::new();
        if status.is_some() {
            clauses.push("status = $status");
        }
        if source_type.is_some() {
            clauses.push("source_type = $source_type");
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT * FROM {table} {where_clause} ORDER BY created_at DESC LIMIT $limit START $offset",
            table = Self::table_name(),
        );

        let mut query = db
            .query(sql)
            .bind(("limit", i64::try_from(limit).unwrap_or(i64::MAX)))
            .bind(("offset", i64::try_from(offset).unwrap_or(0)));
        if let Some(status) = status {
            query = query.bind(("status", status));
        }
        if let Some(source_type) = source_type {
            query = query.bind(("source_type", source_type));
        }

        let sources: Vec<Self> = query.await?.take(0)?;
        Ok(sources)
    }

    /// Narrow a requested source-id set to the ones that are READY. An empty
    /// request means "every ready source".
    pub async fn resolve_ready_ids(
        requested: &[String],
        db: &SurrealDbClient,
    ) -> Result<Vec<String>, AppError> {
        let mut response = if requested.is_empty() {
            db.query("SELECT * FROM source WHERE status = $status")
                .bind(("status", SourceStatus::Ready))
                .await?
        } else {
            db.query("SELECT * FROM source WHERE status = $status AND id INSIDE $ids")
                .bind(("status", SourceStatus::Ready))
                .bind((
                    "ids",
                    requested
                        .iter()
                        .map(|id| surrealdb::sql::Thing::from(("source", id.as_str())))
                        .collect::<Vec<_>>(),
                ))
                .await?
        };

        let sources: Vec<Self> = response.take(0)?;
        let mut ids: Vec<String> = sources.into_iter().map(|s| s.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Remove the source and everything hanging off it: chunks, embeddings,
    /// queued jobs, queries, and persisted answers that cite it. A single
    /// transaction so readers never observe half-deleted state.
    pub async fn delete_cascade(id: &str, db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let source: Option<Self> = db.get_item(id).await?;
        if source.is_none() {
            return Ok(None);
        }

        db.query(
            "BEGIN TRANSACTION;
             DELETE document_chunk WHERE source_id = $id;
             DELETE chunk_embedding WHERE source_id = $id;
             DELETE ingestion_job WHERE source_id = $id;
             DELETE answer WHERE $id INSIDE source_ids;
             DELETE query WHERE $id INSIDE source_ids;
             DELETE type::thing('source', $id);
             COMMIT TRANSACTION;",
        )
        .bind(("id", id.to_string()))
        .await?
        .check()?;

        Ok(source)
    }
}
