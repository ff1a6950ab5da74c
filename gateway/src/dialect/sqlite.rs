//! Embedded-file (SQLite) adapter.

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{ColumnInfo, SourceKind, StatementOutput};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Executor, Row, SqliteConnection, Statement, TypeInfo, ValueRef};

use super::{mismatched, quote_literal, Dialect, DialectConnection};
use crate::rows::{describe_columns, json_bytes, json_float, json_text_or_bytes, normalize_rows};
use crate::translate::translate;

const LIST_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
     ORDER BY name";

/// `PRAGMA table_info` statement for one table.
pub fn table_info_sql(table: &str) -> String {
    format!("PRAGMA table_info({})", quote_literal(table))
}

pub struct SqliteDialect;

impl SqliteDialect {
    fn conn<'a>(&self, conn: &'a mut DialectConnection) -> AppResult<&'a mut SqliteConnection> {
        match conn {
            DialectConnection::Sqlite(inner) => Ok(inner),
            other => Err(mismatched(SourceKind::Sqlite, other)),
        }
    }
}

#[async_trait]
impl Dialect for SqliteDialect {
    fn kind(&self) -> SourceKind {
        SourceKind::Sqlite
    }

    async fn connect(&self, uri: &str) -> AppResult<DialectConnection> {
        let conn = SqliteConnectOptions::new()
            .filename(uri)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(translate)?;
        Ok(DialectConnection::Sqlite(conn))
    }

    async fn list_schemas(&self, _conn: &mut DialectConnection) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_tables(
        &self,
        conn: &mut DialectConnection,
        _schema: Option<&str>,
    ) -> AppResult<Vec<String>> {
        let conn = self.conn(conn)?;
        let rows = sqlx::query(LIST_TABLES)
            .fetch_all(&mut *conn)
            .await
            .map_err(translate)?;
        rows.iter()
            .map(|row| row.try_get_unchecked::<String, _>(0).map_err(translate))
            .collect()
    }

    async fn list_columns(
        &self,
        conn: &mut DialectConnection,
        table: &str,
        _schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>> {
        let conn = self.conn(conn)?;
        let rows = sqlx::query(&table_info_sql(table))
            .fetch_all(&mut *conn)
            .await
            .map_err(translate)?;
        rows.iter().map(pragma_column).collect()
    }

    async fn execute(
        &self,
        conn: &mut DialectConnection,
        sql: &str,
        commit: bool,
    ) -> AppResult<StatementOutput> {
        let conn = self.conn(conn)?;
        if commit {
            return run(conn, sql).await.map_err(translate);
        }

        let mut tx = conn.begin().await.map_err(translate)?;
        let output = run(&mut tx, sql).await;
        tx.rollback().await.map_err(translate)?;
        output.map_err(translate)
    }
}

fn pragma_column(row: &SqliteRow) -> AppResult<ColumnInfo> {
    let cid: i64 = row.try_get_unchecked("cid").map_err(translate)?;
    let name: String = row.try_get_unchecked("name").map_err(translate)?;
    let data_type: String = row.try_get_unchecked("type").map_err(translate)?;
    let not_null: i64 = row.try_get_unchecked("notnull").map_err(translate)?;
    Ok(ColumnInfo {
        name,
        data_type: (!data_type.is_empty()).then_some(data_type),
        nullable: Some(not_null == 0),
        ordinal_position: Some(cid as u32 + 1),
    })
}

async fn run(conn: &mut SqliteConnection, sql: &str) -> Result<StatementOutput, sqlx::Error> {
    let statement = (&mut *conn).prepare(sql).await?;
    let columns = describe_columns(statement.columns());

    if columns.is_empty() {
        let done = statement.query().execute(&mut *conn).await?;
        return Ok(StatementOutput {
            rows: Vec::new(),
            columns,
            affected_rows: Some(done.rows_affected()),
        });
    }

    let rows = statement.query().fetch_all(&mut *conn).await?;
    Ok(StatementOutput {
        rows: normalize_rows(&rows, &columns, decode_value),
        columns,
        affected_rows: None,
    })
}

/// Decodes by the storage class of the stored value, not the declared type.
fn decode_value(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return Value::Null,
    };

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" | "INT8" => row.try_get_unchecked::<i64, _>(index).map(Value::from),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(json_float),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| json_bytes(&bytes)),
        _ => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(json_text_or_bytes),
    };
    value.unwrap_or(Value::Null)
}
