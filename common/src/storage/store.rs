use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::error::AppError;

pub type DynStore = Arc<dyn ObjectStore>;

/// Holds the original bytes of every source under
/// `<storage_root>/<source_id>.<ext>`. Deleting a source removes its object.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    pub async fn new(storage_root: &str) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(storage_root).await?;

        let store = LocalFileSystem::new_with_prefix(storage_root)
            .map_err(|e| AppError::InternalError(format!("storage init failed: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            local_base: Some(PathBuf::from(storage_root)),
        })
    }

    /// Purely in-memory backend for tests.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            local_base: None,
        }
    }

    pub fn local_base_path(&self) -> Option<&std::path::Path> {
        self.local_base.as_deref()
    }

    fn object_name(source_id: &str, extension: &str) -> String {
        format!("{source_id}.{extension}")
    }

    pub async fn put_source_bytes(
        &self,
        source_id: &str,
        extension: &str,
        data: Bytes,
    ) -> Result<(), AppError> {
        let path = ObjPath::from(Self::object_name(source_id, extension));
        let payload = object_store::PutPayload::from_bytes(data);
        self.store
            .put(&path, payload)
            .await
            .map_err(|e| AppError::InternalError(format!("storage write failed: {e}")))?;
        Ok(())
    }

    pub async fn get_source_bytes(
        &self,
        source_id: &str,
        extension: &str,
    ) -> Result<Bytes, AppError> {
        let path = ObjPath::from(Self::object_name(source_id, extension));
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                AppError::NotFound(format!("stored bytes for source {source_id} are missing"))
            }
            other => AppError::InternalError(format!("storage read failed: {other}")),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| AppError::InternalError(format!("storage read failed: {e}")))
    }

    /// Remove the object; missing objects are fine (delete is idempotent).
    pub async fn delete_source_bytes(
        &self,
        source_id: &str,
        extension: &str,
    ) -> Result<(), AppError> {
        let path = ObjPath::from(Self::object_name(source_id, extension));
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(AppError::InternalError(format!(
                "storage delete failed: {e}"
            ))),
        }
    }
}
