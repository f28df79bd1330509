use std::collections::HashMap;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use surrealdb::RecordId;
use uuid::Uuid;

use super::chunk_embedding::ChunkEmbedding;

stored_object!(DocumentChunk, "document_chunk", {
    source_id: String,
    /// 0-based, dense within a source.
    ordinal: u32,
    page_start: Option<u32>,
    page_end: Option<u32>,
    /// Heading trail active at `char_start`; outermost first.
    section_path: Vec<String>,
    text: String,
    /// Absolute half-open char offsets into the cleaned source text.
    char_start: usize,
    char_end: usize
});

/// A chunk row plus its retrieval score; the embedding rides along when the
/// query path had it at hand (vector search) so later stages can reuse it.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ChunkSearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_id: String,
        ordinal: u32,
        text: String,
        char_start: usize,
        char_end: usize,
        page_start: Option<u32>,
        page_end: Option<u32>,
        section_path: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            source_id,
            ordinal,
            page_start,
            page_end,
            section_path,
            text,
            char_start,
            char_end,
        }
    }

    /// Replace a source's chunks and embeddings in one transaction. Prior
    /// rows are deleted first so re-running ingestion converges instead of
    /// duplicating.
    pub async fn replace_for_source(
        source_id: &str,
        chunks: Vec<(DocumentChunk, Vec<f32>)>,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        let mut query = db
            .client
            .query("BEGIN TRANSACTION;")
            .query("DELETE document_chunk WHERE source_id = $source_id;")
            .query("DELETE chunk_embedding WHERE source_id = $source_id;")
            .bind(("source_id", source_id.to_string()));

        for (index, (chunk, embedding)) in chunks.into_iter().enumerate() {
            let emb = ChunkEmbedding::new(&chunk.id, chunk.source_id.clone(), embedding);
            query = query
                .query(format!(
                    "CREATE type::thing('document_chunk', $chunk_id_{index}) CONTENT $chunk_{index};"
                ))
                .query(format!(
                    "CREATE type::thing('chunk_embedding', $emb_id_{index}) CONTENT $emb_{index};"
                ))
                .bind((format!("chunk_id_{index}"), chunk.id.clone()))
                .bind((format!("chunk_{index}"), chunk))
                .bind((format!("emb_id_{index}"), emb.id.clone()))
                .bind((format!("emb_{index}"), emb));
        }

        let response = query.query("COMMIT TRANSACTION;").await?;
        response.check()?;

        Ok(())
    }

    pub async fn delete_by_source_id(
        source_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.query(
            "BEGIN TRANSACTION;
             DELETE document_chunk WHERE source_id = $source_id;
             DELETE chunk_embedding WHERE source_id = $source_id;
             COMMIT TRANSACTION;",
        )
        .bind(("source_id", source_id.to_string()))
        .await?
        .check()?;

        Ok(())
    }

    /// All chunks of a source in ordinal order.
    pub async fn list_for_source(
        source_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .query("SELECT * FROM document_chunk WHERE source_id = $source_id ORDER BY ordinal ASC")
            .bind(("source_id", source_id.to_string()))
            .await?;

        let chunks: Vec<Self> = response.take(0)?;
        Ok(chunks)
    }

    pub async fn get_by_ids(
        ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<HashMap<String, Self>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let things: Vec<RecordId> = ids
            .iter()
            .map(|id| RecordId::from_table_key(Self::table_name(), id))
            .collect();

        let mut response = db
            .query("SELECT * FROM document_chunk WHERE id INSIDE $ids")
            .bind(("ids", things))
            .await?;

        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().map(|row| (row.id.clone(), row)).collect())
    }

    /// Vector search over the embedding table, hydrating full chunk rows.
    /// `source_ids` must already be narrowed to READY sources; an empty slice
    /// matches nothing. With a per-source quota the search runs once per
    /// source so no single source floods the pool.
    pub async fn vector_search(
        take: usize,
        query_embedding: &[f32],
        source_ids: &[String],
        per_source_limit: Option<usize>,
        db: &SurrealDbClient,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        match per_source_limit {
            Some(limit) if source_ids.len() > 1 => {
                let per_source_take = limit.min(take).max(1);
                let mut merged = Vec::new();
                for source_id in source_ids {
                    let batch = Self::vector_search_in(
                        per_source_take,
                        query_embedding,
                        std::slice::from_ref(source_id),
                        db,
                    )
                    .await?;
                    merged.extend(batch);
                }
                merged.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
                });
                merged.truncate(take);
                Ok(merged)
            }
            _ => Self::vector_search_in(take, query_embedding, source_ids, db).await,
        }
    }

    async fn vector_search_in(
        take: usize,
        query_embedding: &[f32],
        source_ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        #[derive(Deserialize)]
        struct Row {
            chunk_id: DocumentChunk,
            embedding: Vec<f32>,
            score: f32,
        }

        let sql = format!(
            r#"
            SELECT
                chunk_id,
                embedding,
                vector::similarity::cosine(embedding, $embedding) AS score
            FROM chunk_embedding
            WHERE source_id INSIDE $source_ids
              AND embedding <|{take},100|> $embedding
            ORDER BY score DESC
            LIMIT {take}
            FETCH chunk_id;
            "#,
        );

        let mut response = db
            .query(&sql)
            .bind(("embedding", query_embedding.to_vec()))
            .bind(("source_ids", source_ids.to_vec()))
            .await
            .map_err(|e| AppError::InternalError(format!("Surreal query failed: {e}")))?;

        let rows: Vec<Row> = response.take::<Vec<Row>>(0).unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|row| ChunkSearchResult {
                chunk: row.chunk_id,
                score: row.score,
                embedding: Some(row.embedding),
            })
            .collect())
    }

    /// Full-text search over chunk text using the BM25 index, restricted to
    /// the given sources. Same quota behavior as `vector_search`.
    pub async fn fts_search(
        take: usize,
        terms: &str,
        source_ids: &[String],
        per_source_limit: Option<usize>,
        db: &SurrealDbClient,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        match per_source_limit {
            Some(limit) if source_ids.len() > 1 => {
                let per_source_take = limit.min(take).max(1);
                let mut merged = Vec::new();
                for source_id in source_ids {
                    let batch = Self::fts_search_in(
                        per_source_take,
                        terms,
                        std::slice::from_ref(source_id),
                        db,
                    )
                    .await?;
                    merged.extend(batch);
                }
                merged.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
                });
                merged.truncate(take);
                Ok(merged)
            }
            _ => Self::fts_search_in(take, terms, source_ids, db).await,
        }
    }

    async fn fts_search_in(
        take: usize,
        terms: &str,
        source_ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<Vec<ChunkSearchResult>, AppError> {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "deserialize_flexible_id")]
            id: String,
            #[serde(deserialize_with = "deserialize_datetime")]
            created_at: DateTime<Utc>,
            #[serde(deserialize_with = "deserialize_datetime")]
            updated_at: DateTime<Utc>,
            source_id: String,
            ordinal: u32,
            page_start: Option<u32>,
            page_end: Option<u32>,
            section_path: Vec<String>,
            text: String,
            char_start: usize,
            char_end: usize,
            score: f32,
        }

        let limit = i64::try_from(take).unwrap_or(i64::MAX);

        let sql = r#"
            SELECT
                id,
                created_at,
                updated_at,
                source_id,
                ordinal,
                page_start,
                page_end,
                section_path,
                text,
                char_start,
                char_end,
                IF search::score(0) != NONE THEN search::score(0) ELSE 0 END AS score
            FROM document_chunk
            WHERE text @0@ $terms
              AND source_id INSIDE $source_ids
            ORDER BY score DESC
            LIMIT $limit;
        "#;

        let mut response = db
            .query(sql)
            .bind(("terms", terms.to_owned()))
            .bind(("source_ids", source_ids.to_vec()))
            .bind(("limit", limit))
            .await
            .map_err(|e| AppError::InternalError(format!("Surreal query failed: {e}")))?;

        response = response.check()?;

        let rows: Vec<Row> = response.take::<Vec<Row>>(0)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let chunk = DocumentChunk {
                    id: row.id,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    source_id: row.source_id,
                    ordinal: row.ordinal,
                    page_start: row.page_start,
                    page_end: row.page_end,
                    section_path: row.section_path,
                    text: row.text,
                    char_start: row.char_start,
                    char_end: row.char_end,
                };

                ChunkSearchResult {
                    chunk,
                    score: row.score,
                    embedding: None,
                }
            })
            .collect())
    }
}
