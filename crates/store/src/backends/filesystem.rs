//! Local filesystem registration store.

use crate::error::{StoreError, StoreResult};
use crate::traits::RegistrationStore;
use async_trait::async_trait;
use ferry_core::Registration;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Filesystem-backed registration store.
///
/// Each registration is one `<id>.json` document under the root directory.
/// Writes go to a uniquely named temp file, are fsynced, then renamed into
/// place, so a crash never leaves a half-written document behind.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a new filesystem store rooted at the given directory.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve the document path for an id.
    ///
    /// Ids are validated upstream by `ferry_core::validate_id`, but the
    /// backend independently rejects anything that could leave the root:
    /// path separators, parent references, and absolute paths.
    fn document_path(&self, id: &str) -> StoreResult<PathBuf> {
        if id.is_empty() {
            return Err(StoreError::InvalidKey("empty id".to_string()));
        }
        if id.contains("..") || id.contains('/') || id.contains('\\') || id == "." {
            return Err(StoreError::InvalidKey(format!(
                "path traversal not allowed: {id}"
            )));
        }
        if Path::new(id).is_absolute() {
            return Err(StoreError::InvalidKey(format!("absolute path: {id}")));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl RegistrationStore for FilesystemStore {
    #[instrument(skip(self, record), fields(backend = "filesystem", id = %record.id))]
    async fn put(&self, record: &Registration) -> StoreResult<()> {
        let path = self.document_path(&record.id)?;

        // Re-ensure the root before every write: cheap, idempotent, and it
        // covers the very first registration after an external cleanup.
        fs::create_dir_all(&self.root).await?;

        // Note: this check-then-write has a race window between exists() and
        // rename(). Two concurrent creators of the same id may both pass the
        // check and the later rename wins. This is the documented
        // last-writer-wins tolerance of the single-instance deployment
        // target; callers get AlreadyExists on every sequential duplicate.
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }

        let data = serde_json::to_vec_pretty(record)?;

        // Unique temp name so concurrent writes to the same key never
        // clobber each other's partial output.
        let temp_path = self.root.join(format!(".tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, id: &str) -> StoreResult<Registration> {
        let path = self.document_path(id)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn remove(&self, id: &str) -> StoreResult<()> {
        let path = self.document_path(id)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, id: &str) -> StoreResult<bool> {
        let path = self.document_path(id)?;
        fs::try_exists(&path).await.map_err(StoreError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StoreResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StoreError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StoreError::Config(format!(
                "storage root is not a directory: {:?}",
                self.root
            )));
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
