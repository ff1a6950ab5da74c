//! Connection registry.
//!
//! CRUD over connection records. Embedded-file connections must point at a
//! blob that exists in the bucket; that check runs on create and on every
//! update that touches the kind or the URI.

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::{ConnectionRecord, CreateConnectionRequest, UpdateConnectionRequest};
use common::utils::IdGenerator;
use tracing::info;
use validator::Validate;

use crate::bucket::BlobStore;
use crate::store::ConnectionStore;

#[derive(Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
    blobs: Arc<BlobStore>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>, blobs: Arc<BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub async fn create(&self, req: CreateConnectionRequest) -> AppResult<ConnectionRecord> {
        req.validate()?;
        let record = req.into_record(IdGenerator::connection_id());
        self.ensure_blob(&record).await?;
        self.store.insert(&record).await?;

        info!(uid = %record.uid, source = %record.source, "connection created");
        Ok(record)
    }

    pub async fn list(&self) -> AppResult<Vec<ConnectionRecord>> {
        self.store.list().await
    }

    pub async fn get(&self, uid: &str) -> AppResult<ConnectionRecord> {
        self.store
            .find(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("connection {uid}")))
    }

    /// Applies a partial update. A failed blob check leaves the stored record untouched.
    pub async fn update(
        &self,
        uid: &str,
        patch: UpdateConnectionRequest,
    ) -> AppResult<ConnectionRecord> {
        patch.validate()?;
        let existing = self.get(uid).await?;
        let merged = patch.merge(&existing);

        if patch.touches_location() {
            self.ensure_blob(&merged).await?;
        }

        if !self.store.update(&merged).await? {
            return Err(AppError::NotFound(format!("connection {uid}")));
        }

        info!(uid = %uid, source = %merged.source, "connection updated");
        Ok(merged)
    }

    pub async fn delete(&self, uid: &str) -> AppResult<()> {
        if !self.store.delete(uid).await? {
            return Err(AppError::NotFound(format!("connection {uid}")));
        }
        info!(uid = %uid, "connection deleted");
        Ok(())
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.store.count().await
    }

    async fn ensure_blob(&self, record: &ConnectionRecord) -> AppResult<()> {
        if record.source.is_embedded_file() && !self.blobs.exists(&record.connection_uri).await {
            return Err(AppError::ValidationFailed(format!(
                "blob '{}' does not exist in the bucket",
                record.connection_uri
            )));
        }
        Ok(())
    }
}
