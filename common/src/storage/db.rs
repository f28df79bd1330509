use crate::error::AppError;

use super::types::StoredObject;
use std::{ops::Deref, sync::Arc};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

pub trait ProvidesDb {
    fn db(&self) -> &Arc<SurrealDbClient>;
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // In-memory engines have no root credentials to sign in with.
        if !address.starts_with("mem:") {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Define every index the service relies on. Idempotent; run at startup
    /// by both the server and the worker.
    ///
    /// `embedding_dimension` must match the provider's output dimension, or
    /// vector search silently degrades, so callers validate before invoking.
    pub async fn ensure_initialized(&self, embedding_dimension: usize) -> Result<(), AppError> {
        self.client
            .query(format!(
                "DEFINE INDEX OVERWRITE idx_chunk_embedding ON chunk_embedding FIELDS embedding HNSW DIMENSION {embedding_dimension};"
            ))
            .await?
            .check()?;

        let fts_sql = r#"
            DEFINE ANALYZER IF NOT EXISTS chunk_text_analyzer TOKENIZERS class, punct FILTERS lowercase, ascii, snowball(english);
            DEFINE INDEX IF NOT EXISTS idx_chunk_text_fts ON TABLE document_chunk FIELDS text SEARCH ANALYZER chunk_text_analyzer BM25;
        "#;
        let snowball_ok = match self.client.query(fts_sql).await {
            Ok(response) => response.check().is_ok(),
            Err(_) => false,
        };
        if !snowball_ok {
            // Snowball stemming is not compiled into every build; fall back
            // to a plain ascii analyzer.
            let fallback_sql = r#"
                DEFINE ANALYZER OVERWRITE chunk_text_analyzer TOKENIZERS class, punct FILTERS lowercase, ascii;
                DEFINE INDEX IF NOT EXISTS idx_chunk_text_fts ON TABLE document_chunk FIELDS text SEARCH ANALYZER chunk_text_analyzer BM25;
            "#;
            self.client.query(fallback_sql).await?.check()?;
        }

        self.client
            .query(
                "DEFINE INDEX IF NOT EXISTS idx_source_status ON source FIELDS status;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_source ON document_chunk FIELDS source_id;
                 DEFINE INDEX IF NOT EXISTS idx_job_status ON ingestion_job FIELDS status;
                 DEFINE INDEX IF NOT EXISTS idx_query_fingerprint ON query FIELDS fingerprint;",
            )
            .await?
            .check()?;

        Ok(())
    }

    pub async fn rebuild_indexes(&self) -> Result<(), Error> {
        self.client
            .query("REBUILD INDEX IF EXISTS idx_chunk_embedding ON chunk_embedding")
            .await?;
        self.client
            .query("REBUILD INDEX IF EXISTS idx_chunk_text_fts ON document_chunk")
            .await?;
        Ok(())
    }

    /// Store an object in its table, keyed by its id.
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

#[cfg(test)]
mod tests {
    use crate::stored_object;

    use super::*;
    use uuid::Uuid;

    stored_object!(Dummy, "dummy", {
        name: String
    });

    #[tokio::test]
    async fn test_initialization_and_crud() {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        db.ensure_initialized(4)
            .await
            .expect("Failed to initialize indexes");

        let dummy = Dummy {
            id: "abc".to_string(),
            name: "first".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let stored = db.store_item(dummy.clone()).await.expect("Failed to store");
        assert!(stored.is_some());

        let fetched = db
            .get_item::<Dummy>(&dummy.id)
            .await
            .expect("Failed to fetch");
        assert_eq!(fetched, Some(dummy.clone()));

        let all = db
            .get_all_stored_items::<Dummy>()
            .await
            .expect("Failed to fetch all");
        assert!(all.contains(&dummy));

        let deleted = db
            .delete_item::<Dummy>(&dummy.id)
            .await
            .expect("Failed to delete");
        assert_eq!(deleted, Some(dummy));

        let fetch_post = db
            .get_item::<Dummy>("abc")
            .await
            .expect("Failed fetch post delete");
        assert!(fetch_post.is_none());
    }
}
