//! MySQL adapter.

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{ColumnInfo, SourceKind, StatementOutput};
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::BigDecimal;
use sqlx::{Connection, Either, Executor, MySqlConnection, Row, Statement, TypeInfo, ValueRef};

use super::{mismatched, quote_literal, Dialect, DialectConnection};
use crate::rows::{describe_columns, json_float, json_text_or_bytes, normalize_rows};
use crate::translate::translate;

/// Schema predicate; the connection's default database when none is given.
fn schema_expr(schema: Option<&str>) -> String {
    schema
        .map(quote_literal)
        .unwrap_or_else(|| "DATABASE()".to_string())
}

/// Catalog query listing base tables and views of one database.
pub fn list_tables_sql(schema: Option<&str>) -> String {
    format!(
        "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
         WHERE table_schema = {} ORDER BY table_name",
        schema_expr(schema)
    )
}

/// Catalog query describing the columns of one table.
pub fn list_columns_sql(table: &str, schema: Option<&str>) -> String {
    let (schema, table) = match table.split_once('.') {
        Some((qualified_schema, name)) => (Some(qualified_schema), name),
        None => (schema, table),
    };
    format!(
        "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR), \
         CAST(is_nullable AS CHAR), CAST(ordinal_position AS UNSIGNED) \
         FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} \
         ORDER BY ordinal_position",
        schema_expr(schema),
        quote_literal(table)
    )
}

pub struct MysqlDialect;

impl MysqlDialect {
    fn conn<'a>(&self, conn: &'a mut DialectConnection) -> AppResult<&'a mut MySqlConnection> {
        match conn {
            DialectConnection::MySql(inner) => Ok(inner),
            other => Err(mismatched(SourceKind::Mysql, other)),
        }
    }
}

#[async_trait]
impl Dialect for MysqlDialect {
    fn kind(&self) -> SourceKind {
        SourceKind::Mysql
    }

    async fn connect(&self, uri: &str) -> AppResult<DialectConnection> {
        let conn = MySqlConnection::connect(uri).await.map_err(translate)?;
        Ok(DialectConnection::MySql(conn))
    }

    // MySQL databases double as schemas; tables are listed per database instead.
    async fn list_schemas(&self, _conn: &mut DialectConnection) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_tables(
        &self,
        conn: &mut DialectConnection,
        schema: Option<&str>,
    ) -> AppResult<Vec<String>> {
        let conn = self.conn(conn)?;
        let rows = sqlx::query(&list_tables_sql(schema))
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
        schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>> {
        let conn = self.conn(conn)?;
        let rows = sqlx::query(&list_columns_sql(table, schema))
            .fetch_all(&mut *conn)
            .await
            .map_err(translate)?;

        rows.iter()
            .map(|row| -> AppResult<ColumnInfo> {
                let is_nullable: String = row.try_get_unchecked(2).map_err(translate)?;
                let ordinal: u64 = row.try_get_unchecked(3).map_err(translate)?;
                Ok(ColumnInfo {
                    name: row.try_get_unchecked(0).map_err(translate)?,
                    data_type: Some(row.try_get_unchecked(1).map_err(translate)?),
                    nullable: Some(is_nullable.eq_ignore_ascii_case("YES")),
                    ordinal_position: Some(ordinal as u32),
                })
            })
            .collect()
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

/// ER_UNSUPPORTED_PS
const UNSUPPORTED_PREPARED_STATEMENT: u16 = 1295;

async fn run(conn: &mut MySqlConnection, sql: &str) -> Result<StatementOutput, sqlx::Error> {
    let statement = match (&mut *conn).prepare(sql).await {
        Ok(statement) => statement,
        Err(err) if refuses_prepare(&err) => return run_text(conn, sql).await,
        Err(err) => return Err(err),
    };
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

fn refuses_prepare(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|db| db.number() == UNSUPPORTED_PREPARED_STATEMENT)
}

/// Runs `sql` over the text protocol.
///
/// Columns are taken from the first row, so an empty result reports none.
async fn run_text(conn: &mut MySqlConnection, sql: &str) -> Result<StatementOutput, sqlx::Error> {
    let mut rows = Vec::new();
    let mut affected = 0;
    {
        let mut results = (&mut *conn).fetch_many(sqlx::raw_sql(sql));
        while let Some(item) = results.try_next().await? {
            match item {
                Either::Left(done) => affected += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
    }

    let columns = rows
        .first()
        .map(|row: &MySqlRow| describe_columns(row.columns()))
        .unwrap_or_default();
    if columns.is_empty() {
        return Ok(StatementOutput {
            rows: Vec::new(),
            columns,
            affected_rows: Some(affected),
        });
    }

    Ok(StatementOutput {
        rows: normalize_rows(&rows, &columns, decode_value),
        columns,
        affected_rows: None,
    })
}

fn decode_value(row: &MySqlRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let value = match type_name.as_str() {
        name if name.ends_with("UNSIGNED") => {
            row.try_get_unchecked::<u64, _>(index).map(Value::from)
        }
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(index).map(Value::from)
        }
        "FLOAT" => row
            .try_get_unchecked::<f32, _>(index)
            .map(|v| json_float(f64::from(v))),
        "DOUBLE" => row.try_get_unchecked::<f64, _>(index).map(json_float),
        "DECIMAL" => row
            .try_get_unchecked::<BigDecimal, _>(index)
            .map(|v| Value::String(v.to_string())),
        "JSON" => row.try_get_unchecked::<Value, _>(index),
        "DATE" => row
            .try_get_unchecked::<NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get_unchecked::<NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "DATETIME" => row
            .try_get_unchecked::<NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => row
            .try_get_unchecked::<DateTime<Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(json_text_or_bytes),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };
    value
        .or_else(|_| row.try_get_unchecked::<Vec<u8>, _>(index).map(json_text_or_bytes))
        .unwrap_or(Value::Null)
}
