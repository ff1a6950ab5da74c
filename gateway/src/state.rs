//! Application state for the gateway service.

use std::sync::Arc;
use std::time::Duration;

use common::config::AppConfig;
use common::errors::AppResult;
use sqlx::SqlitePool;

use crate::bucket::{BlobStore, BucketService};
use crate::dialect::DialectCatalog;
use crate::registry::ConnectionRegistry;
use crate::resolver::ConnectionResolver;
use crate::service::QueryService;
use crate::session::SessionFactory;
use crate::store::{self, QueryLogStore, SqliteStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub registry: ConnectionRegistry,
    pub bucket: BucketService,
    pub queries: QueryService,
}

impl AppState {
    /// Opens the bucket and the metadata store described by `config`.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        // the bucket goes first so a default store under the same data dir has a parent
        let blobs = BlobStore::open(&config.bucket_dir).await?;
        let pool = store::connect_pool(&config.database_url, config.max_connections).await?;
        Self::assemble(config, pool, blobs).await
    }

    /// Builds the state around an existing metadata pool.
    pub async fn with_pool(config: AppConfig, pool: SqlitePool) -> AppResult<Self> {
        let blobs = BlobStore::open(&config.bucket_dir).await?;
        Self::assemble(config, pool, blobs).await
    }

    async fn assemble(config: AppConfig, pool: SqlitePool, blobs: BlobStore) -> AppResult<Self> {
        let store = Arc::new(SqliteStore::new(pool));
        store.ensure_schema().await?;

        let blobs = Arc::new(blobs);
        let registry = ConnectionRegistry::new(store.clone(), blobs.clone());
        let resolver = ConnectionResolver::new(registry.clone(), blobs.clone());
        let sessions = SessionFactory::new(
            DialectCatalog::new(),
            Duration::from_secs(config.connect_timeout_secs.max(1)),
        );
        let query_log: Option<Arc<dyn QueryLogStore>> = if config.query_log_enabled {
            Some(store.clone())
        } else {
            None
        };

        Ok(Self {
            bucket: BucketService::new(blobs, store.clone()),
            queries: QueryService::new(resolver, sessions, query_log),
            registry,
            store,
            config,
        })
    }
}
