//! Dialect adapters.
//!
//! Each supported source kind has one stateless adapter implementing
//! [`Dialect`]. Adapters are registered in the [`DialectCatalog`] and looked up
//! by kind; the rest of the gateway never matches on the kind itself.

pub mod api;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, SourceKind, StatementOutput};
use sqlx::{Connection, MySqlConnection, PgConnection, SqliteConnection};

pub use api::{ApiDialect, ApiEndpoint};
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// An open, dialect-specific connection.
pub enum DialectConnection {
    Sqlite(SqliteConnection),
    Postgres(PgConnection),
    MySql(MySqlConnection),
    Api(ApiEndpoint),
}

impl DialectConnection {
    /// Kind of source this connection talks to.
    pub fn kind(&self) -> SourceKind {
        match self {
            DialectConnection::Sqlite(_) => SourceKind::Sqlite,
            DialectConnection::Postgres(_) => SourceKind::Postgres,
            DialectConnection::MySql(_) => SourceKind::Mysql,
            DialectConnection::Api(_) => SourceKind::Api,
        }
    }

    /// Gracefully closes the underlying connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            DialectConnection::Sqlite(conn) => conn.close().await,
            DialectConnection::Postgres(conn) => conn.close().await,
            DialectConnection::MySql(conn) => conn.close().await,
            DialectConnection::Api(_) => Ok(()),
        }
    }
}

/// Uniform capability surface of a dialect adapter.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// Source kind this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Opens a connection for an already resolved URI.
    async fn connect(&self, uri: &str) -> AppResult<DialectConnection>;

    /// Lists user schemas. Dialects without a schema concept return an empty list.
    async fn list_schemas(&self, conn: &mut DialectConnection) -> AppResult<Vec<String>>;

    /// Lists table names, optionally restricted to a schema.
    async fn list_tables(
        &self,
        conn: &mut DialectConnection,
        schema: Option<&str>,
    ) -> AppResult<Vec<String>>;

    /// Describes the columns of a table.
    async fn list_columns(
        &self,
        conn: &mut DialectConnection,
        table: &str,
        schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>>;

    /// Runs one SQL statement. With `commit == false` the statement runs
    /// inside a transaction that is rolled back afterwards.
    async fn execute(
        &self,
        conn: &mut DialectConnection,
        sql: &str,
        commit: bool,
    ) -> AppResult<StatementOutput>;
}

/// Error for a connection handed to the wrong adapter.
pub(crate) fn mismatched(expected: SourceKind, conn: &DialectConnection) -> AppError {
    AppError::internal(format!(
        "{} adapter received a {} connection",
        expected,
        conn.kind()
    ))
}

/// Registry of dialect adapters keyed by source kind.
#[derive(Clone, Copy)]
pub struct DialectCatalog {
    adapters: &'static [&'static dyn Dialect],
}

static ADAPTERS: [&'static dyn Dialect; 4] = [
    &SqliteDialect,
    &PostgresDialect,
    &MysqlDialect,
    &ApiDialect,
];

impl Default for DialectCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectCatalog {
    pub fn new() -> Self {
        Self {
            adapters: &ADAPTERS,
        }
    }

    /// Returns the adapter registered for `kind`.
    pub fn resolve(&self, kind: SourceKind) -> AppResult<&'static dyn Dialect> {
        self.adapters
            .iter()
            .copied()
            .find(|adapter| adapter.kind() == kind)
            .ok_or_else(|| AppError::UnsupportedDialect(kind.to_string()))
    }
}

/// Renders an identifier into a string literal for catalog queries.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_an_adapter() {
        let catalog = DialectCatalog::new();
        for kind in SourceKind::ALL {
            assert_eq!(catalog.resolve(kind).unwrap().kind(), kind);
        }
        assert_eq!(ADAPTERS.len(), SourceKind::ALL.len());
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("public"), "'public'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }
}
