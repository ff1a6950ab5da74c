//! Metadata persistence: connection records, blob metadata and the query log.
//!
//! The gateway's own bookkeeping lives in a SQLite database reached through a
//! `sqlx` pool. The registry and the upload endpoint only see the traits
//! below.

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::{BlobMetadata, ConnectionRecord, QueryLogMetadata};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uid TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL,
        name TEXT NOT NULL,
        connection_uri TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS buckets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uid TEXT NOT NULL UNIQUE,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS query_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uid TEXT NOT NULL UNIQUE,
        connection_id TEXT NOT NULL,
        query TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
];

/// Durable storage of connection records.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn insert(&self, record: &ConnectionRecord) -> AppResult<()>;
    async fn list(&self) -> AppResult<Vec<ConnectionRecord>>;
    async fn find(&self, uid: &str) -> AppResult<Option<ConnectionRecord>>;
    /// Returns `false` when no record has the given uid.
    async fn update(&self, record: &ConnectionRecord) -> AppResult<bool>;
    /// Returns `false` when no record has the given uid.
    async fn delete(&self, uid: &str) -> AppResult<bool>;
    async fn count(&self) -> AppResult<u64>;
}

/// Storage of uploaded blob metadata.
#[async_trait]
pub trait BlobIndex: Send + Sync {
    async fn record_blob(&self, uid: &str, metadata: &BlobMetadata) -> AppResult<()>;
}

/// One executed statement.
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub uid: String,
    pub connection_id: String,
    pub query: String,
    pub metadata: QueryLogMetadata,
}

/// Append-only query log.
#[async_trait]
pub trait QueryLogStore: Send + Sync {
    async fn append(&self, entry: &QueryLogEntry) -> AppResult<()>;
}

#[derive(Debug, FromRow)]
struct ConnectionRow {
    uid: String,
    source: String,
    name: String,
    connection_uri: String,
}

impl ConnectionRow {
    fn into_record(self) -> AppResult<ConnectionRecord> {
        Ok(ConnectionRecord {
            source: self.source.parse()?,
            uid: self.uid,
            name: self.name,
            connection_uri: self.connection_uri,
        })
    }
}

/// Opens the metadata pool. In-memory databases are pinned to one long-lived
/// connection so every handle sees the same data.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::persistence)?
        .create_if_missing(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(AppError::persistence)?;

    info!(url = %database_url, in_memory, "metadata store connected");
    Ok(pool)
}

/// SQLite-backed metadata store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the metadata tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AppError::persistence)?;
        }
        debug!("metadata schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionStore for SqliteStore {
    async fn insert(&self, record: &ConnectionRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO connections (uid, source, name, connection_uri) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.uid)
        .bind(record.source.as_str())
        .bind(&record.name)
        .bind(&record.connection_uri)
        .execute(&self.pool)
        .await
        .map_err(AppError::persistence)?;
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<ConnectionRecord>> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(
            "SELECT uid, source, name, connection_uri FROM connections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::persistence)?;

        rows.into_iter().map(ConnectionRow::into_record).collect()
    }

    async fn find(&self, uid: &str) -> AppResult<Option<ConnectionRecord>> {
        let row: Option<ConnectionRow> = sqlx::query_as(
            "SELECT uid, source, name, connection_uri FROM connections WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::persistence)?;

        row.map(ConnectionRow::into_record).transpose()
    }

    async fn update(&self, record: &ConnectionRecord) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE connections SET source = ?, name = ?, connection_uri = ? WHERE uid = ?",
        )
        .bind(record.source.as_str())
        .bind(&record.name)
        .bind(&record.connection_uri)
        .bind(&record.uid)
        .execute(&self.pool)
        .await
        .map_err(AppError::persistence)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, uid: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM connections WHERE uid = ?")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(AppError::persistence)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> AppResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM connections")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::persistence)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl BlobIndex for SqliteStore {
    async fn record_blob(&self, uid: &str, metadata: &BlobMetadata) -> AppResult<()> {
        let metadata = serde_json::to_string(metadata).map_err(AppError::internal)?;
        sqlx::query("INSERT INTO buckets (uid, metadata) VALUES (?, ?)")
            .bind(uid)
            .bind(metadata)
            .execute(&self.pool)
            .await
            .map_err(AppError::persistence)?;
        Ok(())
    }
}

#[async_trait]
impl QueryLogStore for SqliteStore {
    async fn append(&self, entry: &QueryLogEntry) -> AppResult<()> {
        let metadata = serde_json::to_string(&entry.metadata).map_err(AppError::internal)?;
        sqlx::query(
            "INSERT INTO query_logs (uid, connection_id, query, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.uid)
        .bind(&entry.connection_id)
        .bind(&entry.query)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(AppError::persistence)?;
        Ok(())
    }
}
