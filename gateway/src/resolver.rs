//! Turns a connection uid into the URI a dialect can open.

use std::sync::Arc;

use common::errors::AppResult;
use common::models::SourceKind;

use crate::bucket::BlobStore;
use crate::registry::ConnectionRegistry;

/// A registry record with its effective URI.
///
/// For embedded-file sources the URI is the absolute blob path; the stored
/// record keeps the bucket-relative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub uid: String,
    pub source: SourceKind,
    pub uri: String,
}

#[derive(Clone)]
pub struct ConnectionResolver {
    registry: ConnectionRegistry,
    blobs: Arc<BlobStore>,
}

impl ConnectionResolver {
    pub fn new(registry: ConnectionRegistry, blobs: Arc<BlobStore>) -> Self {
        Self { registry, blobs }
    }

    pub async fn resolve(&self, uid: &str) -> AppResult<ResolvedConnection> {
        let record = self.registry.get(uid).await?;
        let uri = if record.source.is_embedded_file() {
            self.blobs
                .resolve(&record.connection_uri)?
                .to_string_lossy()
                .into_owned()
        } else {
            record.connection_uri
        };

        Ok(ResolvedConnection {
            uid: record.uid,
            source: record.source,
            uri,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::memory_store;
    use common::errors::AppError;
    use common::models::CreateConnectionRequest;

    #[tokio::test]
    async fn test_embedded_uri_becomes_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(BlobStore::open(dir.path()).await.unwrap());
        let registry = ConnectionRegistry::new(Arc::new(memory_store().await), blobs.clone());
        let resolver = ConnectionResolver::new(registry.clone(), blobs.clone());

        let blob = blobs.save(Some("local.db"), b"x").await.unwrap();
        let record = registry
            .create(CreateConnectionRequest {
                source: SourceKind::Sqlite,
                name: "local".into(),
                connection_uri: blob.stored_name.clone(),
            })
            .await
            .unwrap();

        let resolved = resolver.resolve(&record.uid).await.unwrap();
        assert_eq!(resolved.uri, blobs.resolve(&blob.stored_name).unwrap().to_string_lossy());
        assert!(std::path::Path::new(&resolved.uri).is_absolute());

        // the stored record keeps the bucket-relative name
        assert_eq!(
            registry.get(&record.uid).await.unwrap().connection_uri,
            blob.stored_name
        );
    }

    #[tokio::test]
    async fn test_network_uri_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(BlobStore::open(dir.path()).await.unwrap());
        let registry = ConnectionRegistry::new(Arc::new(memory_store().await), blobs.clone());
        let resolver = ConnectionResolver::new(registry.clone(), blobs);

        let record = registry
            .create(CreateConnectionRequest {
                source: SourceKind::Postgres,
                name: "pg".into(),
                connection_uri: "postgres://u:p@db:5432/app".into(),
            })
            .await
            .unwrap();
        let resolved = resolver.resolve(&record.uid).await.unwrap();
        assert_eq!(resolved.uri, "postgres://u:p@db:5432/app");

        assert!(matches!(
            resolver.resolve("unknown").await,
            Err(AppError::NotFound(_))
        ));
    }
}
