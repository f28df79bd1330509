use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use surrealdb::RecordId;

stored_object!(ChunkEmbedding, "chunk_embedding", {
    /// Record link to the owning chunk; the embedding row reuses the chunk's
    /// id so the mapping stays 1:1.
    chunk_id: RecordId,
    source_id: String,
    embedding: Vec<f32>
});

impl ChunkEmbedding {
    pub fn new(chunk_id: &str, source_id: String, embedding: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: chunk_id.to_string(),
            created_at: now,
            updated_at: now,
            chunk_id: RecordId::from_table_key("document_chunk", chunk_id),
            source_id,
            embedding,
        }
    }

    pub async fn get_by_chunk_id(
        chunk_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        Ok(db.get_item(chunk_id).await?)
    }

    /// Embeddings for a set of chunk ids, keyed by chunk id. Missing rows are
    /// simply absent from the map.
    pub async fn get_many(
        chunk_ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<std::collections::HashMap<String, Vec<f32>>, AppError> {
        if chunk_ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let things: Vec<RecordId> = chunk_ids
            .iter()
            .map(|id| RecordId::from_table_key(Self::table_name(), id))
            .collect();

        let mut response = db
            .query("SELECT * FROM chunk_embedding WHERE id INSIDE $ids")
            .bind(("ids", things))
            .await?;

        let rows: Vec<Self> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), row.embedding))
            .collect())
    }
}
