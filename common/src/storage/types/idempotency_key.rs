use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(IdempotencyKey, "idempotency_key", {
    answer_id: String
});

impl IdempotencyKey {
    /// Look up the answer bound to a client-supplied key.
    pub async fn find(key: &str, db: &SurrealDbClient) -> Result<Option<String>, AppError> {
        let record: Option<Self> = db.get_item(key).await?;
        Ok(record.map(|r| r.answer_id))
    }

    /// Bind a key to an answer on first completion. When two requests race,
    /// the first write wins and both return the winning answer id.
    pub async fn bind(
        key: &str,
        answer_id: &str,
        db: &SurrealDbClient,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let record = Self {
            id: key.to_string(),
            created_at: now,
            updated_at: now,
            answer_id: answer_id.to_string(),
        };

        match db.store_item(record).await {
            Ok(_) => Ok(answer_id.to_string()),
            // A concurrent duplicate completed first; return its answer.
            Err(_) => Self::find(key, db)
                .await?
                .ok_or_else(|| AppError::InternalError("idempotency key vanished".into())),
        }
    }
}
