use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(QueryRecord, "query", {
    /// Deterministic identity over (normalized question, sorted source ids,
    /// mode flags); see `utils::fingerprint`.
    fingerprint: String,
    question: String,
    source_ids: Vec<String>,
    verify: bool,
    highlights: bool,
    rerank: bool,
    answer_id: Option<String>
});

impl QueryRecord {
    #[allow(clippy::fn_params_excessive_bools)]
    pub fn new(
        fingerprint: String,
        question: String,
        source_ids: Vec<String>,
        verify: bool,
        highlights: bool,
        rerank: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            fingerprint,
            question,
            source_ids,
            verify,
            highlights,
            rerank,
            answer_id: None,
        }
    }

    pub async fn set_answer_id(
        id: &str,
        answer_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.query(
            "UPDATE type::thing('query', $id)
             SET answer_id = $answer_id, updated_at = time::now()",
        )
        .bind(("id", id.to_string()))
        .bind(("answer_id", answer_id.to_string()))
        .await?
        .check()?;

        Ok(())
    }
}
