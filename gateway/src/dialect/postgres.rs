//! PostgreSQL adapter.

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{ColumnInfo, SourceKind, StatementOutput};
use serde_json::Value;
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Connection, Executor, PgConnection, Row, Statement, TypeInfo, ValueRef};

use super::{mismatched, quote_literal, Dialect, DialectConnection};
use crate::rows::{describe_columns, json_bytes, json_float, normalize_rows};
use crate::translate::translate;

const DEFAULT_SCHEMA: &str = "public";

const LIST_SCHEMAS: &str = "SELECT schema_name::text FROM information_schema.schemata \
     WHERE schema_name NOT LIKE 'pg\\_%' AND schema_name <> 'information_schema' \
     ORDER BY schema_name";

/// Catalog query listing the tables of one schema.
pub fn list_tables_sql(schema: Option<&str>) -> String {
    format!(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = {} ORDER BY table_name",
        quote_literal(schema.unwrap_or(DEFAULT_SCHEMA))
    )
}

/// Catalog query describing the columns of one table.
///
/// A `schema.table` name takes precedence over the separate schema argument.
pub fn list_columns_sql(table: &str, schema: Option<&str>) -> String {
    let (schema, table) = match table.split_once('.') {
        Some((qualified_schema, name)) => (qualified_schema, name),
        None => (schema.unwrap_or(DEFAULT_SCHEMA), table),
    };
    format!(
        "SELECT column_name::text, data_type::text, is_nullable::text, ordinal_position::int4 \
         FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} \
         ORDER BY ordinal_position",
        quote_literal(schema),
        quote_literal(table)
    )
}

pub struct PostgresDialect;

impl PostgresDialect {
    fn conn<'a>(&self, conn: &'a mut DialectConnection) -> AppResult<&'a mut PgConnection> {
        match conn {
            DialectConnection::Postgres(inner) => Ok(inner),
            other => Err(mismatched(SourceKind::Postgres, other)),
        }
    }

    async fn names(&self, conn: &mut DialectConnection, sql: &str) -> AppResult<Vec<String>> {
        let conn = self.conn(conn)?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(translate)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(translate))
            .collect()
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn kind(&self) -> SourceKind {
        SourceKind::Postgres
    }

    async fn connect(&self, uri: &str) -> AppResult<DialectConnection> {
        let conn = PgConnection::connect(uri).await.map_err(translate)?;
        Ok(DialectConnection::Postgres(conn))
    }

    async fn list_schemas(&self, conn: &mut DialectConnection) -> AppResult<Vec<String>> {
        self.names(conn, LIST_SCHEMAS).await
    }

    async fn list_tables(
        &self,
        conn: &mut DialectConnection,
        schema: Option<&str>,
    ) -> AppResult<Vec<String>> {
        self.names(conn, &list_tables_sql(schema)).await
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
                let is_nullable: String = row.try_get(2).map_err(translate)?;
                let ordinal: i32 = row.try_get(3).map_err(translate)?;
                Ok(ColumnInfo {
                    name: row.try_get(0).map_err(translate)?,
                    data_type: Some(row.try_get(1).map_err(translate)?),
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

async fn run(conn: &mut PgConnection, sql: &str) -> Result<StatementOutput, sqlx::Error> {
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

fn decode_value(row: &PgRow, index: usize) -> Value {
    let type_info = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().into_owned(),
        Err(_) => return Value::Null,
    };
    decode_as(row, index, &type_info)
}

/// Decodes a non-null value of `type_info`.
///
/// Values arrive in the binary wire format, so only text-like types may be
/// read as strings. Anything without a JSON rendering is returned as the hex
/// of its wire bytes.
fn decode_as(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Value {
    match type_info.kind() {
        PgTypeKind::Domain(base) => return decode_as(row, index, base),
        PgTypeKind::Enum(_) => {
            return row
                .try_get_unchecked::<String, _>(index)
                .map(Value::String)
                .unwrap_or_else(|_| wire_hex(row, index))
        }
        _ => {}
    }

    let name = type_info.name().to_ascii_uppercase();
    let value = match name.as_str() {
        "BOOL" => row.try_get_unchecked::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get_unchecked::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get_unchecked::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get_unchecked::<i64, _>(index).map(Value::from),
        "OID" => row
            .try_get_unchecked::<Oid, _>(index)
            .map(|oid| Value::from(oid.0)),
        "FLOAT4" => row
            .try_get_unchecked::<f32, _>(index)
            .map(|v| json_float(f64::from(v))),
        "FLOAT8" => row.try_get_unchecked::<f64, _>(index).map(json_float),
        "NUMERIC" => row
            .try_get_unchecked::<BigDecimal, _>(index)
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row.try_get_unchecked::<Value, _>(index),
        "UUID" => row
            .try_get_unchecked::<Uuid, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get_unchecked::<DateTime<Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get_unchecked::<NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "DATE" => row
            .try_get_unchecked::<NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get_unchecked::<NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIMETZ" => row
            .try_get_unchecked::<PgTimeTz<NaiveTime, FixedOffset>, _>(index)
            .map(|v| Value::String(format!("{}{}", v.time, v.offset))),
        "INTERVAL" => row
            .try_get_unchecked::<PgInterval, _>(index)
            .map(|v| Value::String(interval_iso8601(&v))),
        "INET" | "CIDR" => row
            .try_get_unchecked::<IpNetwork, _>(index)
            .map(|v| Value::String(network_text(v, name == "CIDR"))),
        "BYTEA" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|v| json_bytes(&v)),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            row.try_get_unchecked::<String, _>(index).map(Value::String)
        }
        "\"CHAR\"" => row
            .try_get_unchecked::<i8, _>(index)
            .map(|v| Value::String(char::from(v as u8).to_string())),
        "VOID" => Ok(Value::Null),
        "BOOL[]" => row
            .try_get_unchecked::<Vec<Option<bool>>, _>(index)
            .map(Value::from),
        "INT2[]" => row
            .try_get_unchecked::<Vec<Option<i16>>, _>(index)
            .map(Value::from),
        "INT4[]" => row
            .try_get_unchecked::<Vec<Option<i32>>, _>(index)
            .map(Value::from),
        "INT8[]" => row
            .try_get_unchecked::<Vec<Option<i64>>, _>(index)
            .map(Value::from),
        "FLOAT4[]" => row
            .try_get_unchecked::<Vec<Option<f32>>, _>(index)
            .map(|v| json_array(v, |f| json_float(f64::from(f)))),
        "FLOAT8[]" => row
            .try_get_unchecked::<Vec<Option<f64>>, _>(index)
            .map(|v| json_array(v, json_float)),
        "NUMERIC[]" => row
            .try_get_unchecked::<Vec<Option<BigDecimal>>, _>(index)
            .map(|v| json_array(v, |d| Value::String(d.to_string()))),
        "UUID[]" => row
            .try_get_unchecked::<Vec<Option<Uuid>>, _>(index)
            .map(|v| json_array(v, |u| Value::String(u.to_string()))),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => row
            .try_get_unchecked::<Vec<Option<String>>, _>(index)
            .map(Value::from),
        _ => return wire_hex(row, index),
    };
    value.unwrap_or_else(|_| wire_hex(row, index))
}

fn json_array<T>(values: Vec<Option<T>>, render: impl Fn(T) -> Value) -> Value {
    Value::Array(
        values
            .into_iter()
            .map(|value| value.map(&render).unwrap_or(Value::Null))
            .collect(),
    )
}

/// Hex of the raw wire bytes of a value.
fn wire_hex(row: &PgRow, index: usize) -> Value {
    row.try_get_raw(index)
        .ok()
        .and_then(|raw| raw.as_bytes().ok().map(json_bytes))
        .unwrap_or(Value::Null)
}

/// ISO-8601 duration, e.g. `P1Y2M3DT4H5M6.5S`.
fn interval_iso8601(interval: &PgInterval) -> String {
    let mut out = String::from("P");
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    let micros = interval.microseconds;
    if micros != 0 {
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let hours = abs / 3_600_000_000;
        let minutes = abs / 60_000_000 % 60;
        let seconds = abs / 1_000_000 % 60;
        let fraction = abs % 1_000_000;

        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{sign}{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{sign}{minutes}M"));
        }
        if seconds != 0 || fraction != 0 {
            let fraction = format!("{fraction:06}");
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                out.push_str(&format!("{sign}{seconds}S"));
            } else {
                out.push_str(&format!("{sign}{seconds}.{fraction}S"));
            }
        }
    }

    if out == "P" {
        out.push_str("T0S");
    }
    out
}

/// Postgres text form: host addresses in `inet` drop their full-length mask.
fn network_text(network: IpNetwork, cidr: bool) -> String {
    let host_prefix = if network.is_ipv4() { 32 } else { 128 };
    if !cidr && network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}
