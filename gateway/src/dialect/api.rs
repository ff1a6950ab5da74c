//! Generic HTTP API sources.
//!
//! API sources are registered like any other connection but expose no
//! relational catalog. Opening one performs no I/O.

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, SourceKind, StatementOutput};

use super::{mismatched, Dialect, DialectConnection};

/// Endpoint of a generic API source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base_url: String,
}

impl ApiEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

pub struct ApiDialect;

/// Rejects a catalog or SQL operation on an API source.
fn unsupported(conn: &DialectConnection, operation: &str) -> AppError {
    match conn {
        DialectConnection::Api(endpoint) => AppError::DialectBadRequest(format!(
            "{operation} is not available for api source {}",
            endpoint.base_url
        )),
        other => mismatched(SourceKind::Api, other),
    }
}

#[async_trait]
impl Dialect for ApiDialect {
    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn connect(&self, uri: &str) -> AppResult<DialectConnection> {
        Ok(DialectConnection::Api(ApiEndpoint::new(uri)))
    }

    async fn list_schemas(&self, conn: &mut DialectConnection) -> AppResult<Vec<String>> {
        match conn {
            DialectConnection::Api(_) => Ok(Vec::new()),
            other => Err(mismatched(SourceKind::Api, other)),
        }
    }

    async fn list_tables(
        &self,
        conn: &mut DialectConnection,
        _schema: Option<&str>,
    ) -> AppResult<Vec<String>> {
        Err(unsupported(conn, "table listing"))
    }

    async fn list_columns(
        &self,
        conn: &mut DialectConnection,
        _table: &str,
        _schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>> {
        Err(unsupported(conn, "column listing"))
    }

    async fn execute(
        &self,
        conn: &mut DialectConnection,
        _sql: &str,
        _commit: bool,
    ) -> AppResult<StatementOutput> {
        Err(unsupported(conn, "SQL execution"))
    }
}
