//! Blob bucket for embedded database files.
//!
//! Uploads are stored flat under the bucket directory as `{uuid}{ext}`. The
//! stored name is what clients use as the `connection_uri` of an embedded-file
//! connection.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::{BlobMetadata, BucketItem};
use common::utils::IdGenerator;
use tracing::info;

use crate::store::BlobIndex;

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Creates the bucket directory if needed and anchors the store at its
    /// absolute path.
    pub async fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::internal(format!("create bucket {}: {e}", dir.display())))?;
        let root = tokio::fs::canonicalize(dir)
            .await
            .map_err(|e| AppError::internal(format!("resolve bucket {}: {e}", dir.display())))?;
        Ok(Self { root })
    }

    /// Absolute path of a stored blob.
    ///
    /// Blobs live flat under the root, so `uri` must be a single plain file
    /// name. Parent references, absolute paths and nested paths are rejected.
    pub fn resolve(&self, uri: &str) -> AppResult<PathBuf> {
        let mut components = Path::new(uri).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(AppError::ValidationFailed(format!(
                "blob '{uri}' is not a file name inside the bucket"
            ))),
        }
    }

    /// Whether `uri` names an existing blob file.
    pub async fn exists(&self, uri: &str) -> bool {
        let Ok(path) = self.resolve(uri) else {
            return false;
        };
        tokio::fs::symlink_metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Stores `bytes` under a fresh name that keeps the original extension.
    pub async fn save(&self, filename: Option<&str>, bytes: &[u8]) -> AppResult<BlobMetadata> {
        let stored_name = stored_name(&IdGenerator::blob_id(), filename);
        tokio::fs::write(self.resolve(&stored_name)?, bytes)
            .await
            .map_err(|e| AppError::internal(format!("write blob {stored_name}: {e}")))?;

        Ok(BlobMetadata {
            file_size: bytes.len() as u64,
            filename: filename.map(str::to_string),
            stored_name,
        })
    }

    /// Removes a stored blob; missing files are ignored.
    pub async fn remove(&self, uri: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.resolve(uri)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::internal(format!("remove blob {uri}: {e}"))),
        }
    }
}

fn stored_name(id: &str, filename: Option<&str>) -> String {
    let extension = filename
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());
    match extension {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

/// Upload workflow: store the bytes, then record their metadata.
#[derive(Clone)]
pub struct BucketService {
    blobs: Arc<BlobStore>,
    index: Arc<dyn BlobIndex>,
}

impl BucketService {
    pub fn new(blobs: Arc<BlobStore>, index: Arc<dyn BlobIndex>) -> Self {
        Self { blobs, index }
    }

    pub async fn upload(&self, filename: Option<&str>, bytes: &[u8]) -> AppResult<BucketItem> {
        let metadata = self.blobs.save(filename, bytes).await?;

        if let Err(e) = self.index.record_blob(&metadata.stored_name, &metadata).await {
            self.blobs.remove(&metadata.stored_name).await?;
            return Err(e);
        }

        info!(
            uid = %metadata.stored_name,
            size = metadata.file_size,
            "blob stored"
        );

        Ok(BucketItem {
            uid: metadata.stored_name,
            filename: metadata.filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::memory_store;

    #[test]
    fn test_stored_name_keeps_extension() {
        assert_eq!(stored_name("abc", Some("sample.db")), "abc.db");
        assert_eq!(stored_name("abc", Some("archive.tar.gz")), "abc.gz");
        assert_eq!(stored_name("abc", Some("README")), "abc");
        assert_eq!(stored_name("abc", None), "abc");
    }

    #[tokio::test]
    async fn test_save_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("bucket")).await.unwrap();
        let meta = store.save(Some("local.db"), b"payload").await.unwrap();
        assert!(store.resolve(&meta.stored_name).unwrap().is_absolute());
        assert!(meta.stored_name.ends_with(".db"));
        assert_eq!(meta.file_size, 7);
        assert!(store.exists(&meta.stored_name).await);
        assert!(!store.exists("missing.db").await);
        assert!(!store.exists("").await);
        assert_eq!(
            std::fs::read(store.resolve(&meta.stored_name).unwrap()).unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_uris_outside_the_bucket_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("outside.db"), b"secret").unwrap();
        let store = BlobStore::open(dir.path().join("bucket")).await.unwrap();
        let inside = store.save(Some("inside.db"), b"x").await.unwrap();

        let absolute = dir.path().join("outside.db");
        for uri in [
            "../outside.db",
            absolute.to_str().unwrap(),
            "./outside.db/..",
            "nested/outside.db",
            "",
            ".",
        ] {
            assert!(!store.exists(uri).await, "{uri} should not resolve");
            assert!(matches!(
                store.resolve(uri),
                Err(AppError::ValidationFailed(_))
            ));
        }
        assert!(store.exists(&inside.stored_name).await);
    }

    #[tokio::test]
    async fn test_upload_records_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(BlobStore::open(dir.path()).await.unwrap());
        let index = Arc::new(memory_store().await);
        let service = BucketService::new(blobs.clone(), index.clone());

        let item = service.upload(Some("sample.db"), b"bytes").await.unwrap();
        // the uid is the stored file name clients use as connection_uri
        assert!(item.uid.ends_with(".db"));
        assert!(blobs.exists(&item.uid).await);
        assert_eq!(item.filename.as_deref(), Some("sample.db"));

        let (stored,): (String,) = sqlx::query_as("SELECT uid FROM buckets")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(stored, item.uid);
    }
}
