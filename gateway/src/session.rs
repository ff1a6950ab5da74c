//! Per-request data source sessions.
//!
//! A [`Session`] pairs an open dialect connection with its adapter. Sessions
//! are opened for exactly one operation and released right after it, on the
//! success and the failure path alike. A session dropped without `release`
//! (cancelled request) still closes its socket when the connection drops.

use std::time::Duration;

use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, SourceKind, StatementOutput};
use tracing::{debug, warn};

use crate::dialect::{Dialect, DialectCatalog, DialectConnection};
use crate::resolver::ResolvedConnection;

/// An open session against one registered connection.
pub struct Session {
    connection_id: String,
    dialect: &'static dyn Dialect,
    conn: DialectConnection,
}

impl Session {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn kind(&self) -> SourceKind {
        self.dialect.kind()
    }

    pub async fn list_schemas(&mut self) -> AppResult<Vec<String>> {
        self.dialect.list_schemas(&mut self.conn).await
    }

    pub async fn list_tables(&mut self, schema: Option<&str>) -> AppResult<Vec<String>> {
        self.dialect.list_tables(&mut self.conn, schema).await
    }

    pub async fn list_columns(
        &mut self,
        table: &str,
        schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>> {
        self.dialect.list_columns(&mut self.conn, table, schema).await
    }

    pub async fn execute(&mut self, sql: &str, commit: bool) -> AppResult<StatementOutput> {
        self.dialect.execute(&mut self.conn, sql, commit).await
    }

    /// Closes the underlying connection. Close failures are logged only.
    pub async fn release(self) {
        let connection_id = self.connection_id;
        match self.conn.close().await {
            Ok(()) => debug!(connection_id = %connection_id, "session released"),
            Err(e) => warn!(connection_id = %connection_id, error = %e, "session close failed"),
        }
    }
}

/// Opens sessions for resolved connections.
#[derive(Clone)]
pub struct SessionFactory {
    catalog: DialectCatalog,
    connect_timeout: Duration,
}

impl SessionFactory {
    pub fn new(catalog: DialectCatalog, connect_timeout: Duration) -> Self {
        Self {
            catalog,
            connect_timeout,
        }
    }

    /// Opens a session using the resolved URI, bounded by the connect timeout.
    pub async fn open(&self, resolved: &ResolvedConnection) -> AppResult<Session> {
        let dialect = self.catalog.resolve(resolved.source)?;

        let conn = tokio::time::timeout(self.connect_timeout, dialect.connect(&resolved.uri))
            .await
            .map_err(|_| {
                AppError::DialectUnreachable(format!(
                    "timed out after {}s opening {} connection",
                    self.connect_timeout.as_secs(),
                    resolved.source
                ))
            })??;

        debug!(
            connection_id = %resolved.uid,
            source = %resolved.source,
            "session opened"
        );

        Ok(Session {
            connection_id: resolved.uid.clone(),
            dialect,
            conn,
        })
    }
}
