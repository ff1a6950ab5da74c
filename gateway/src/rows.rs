//! Row and column normalization shared by the SQL dialects.

use std::collections::HashSet;

use common::models::ColumnInfo;
use serde_json::{Map, Number, Value};
use sqlx::{Column, Row, TypeInfo};

/// Describes statement output columns in ordinal order.
pub fn describe_columns<C: Column>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            ColumnInfo {
                name: column.name().to_string(),
                data_type: (!type_name.is_empty() && type_name != "NULL")
                    .then(|| type_name.to_string()),
                nullable: None,
                ordinal_position: Some(column.ordinal() as u32 + 1),
            }
        })
        .collect()
}

/// Whether rows can be rendered as objects keyed by column name.
pub fn has_unique_names(columns: &[ColumnInfo]) -> bool {
    let mut seen = HashSet::with_capacity(columns.len());
    columns
        .iter()
        .all(|column| !column.name.is_empty() && seen.insert(column.name.as_str()))
}

/// Converts driver rows into JSON values.
///
/// Rows become objects keyed by column name, or positional arrays when the
/// result has duplicate or empty column names.
pub fn normalize_rows<R, F>(rows: &[R], columns: &[ColumnInfo], decode: F) -> Vec<Value>
where
    R: Row,
    F: Fn(&R, usize) -> Value,
{
    let keyed = has_unique_names(columns);
    rows.iter()
        .map(|row| {
            let width = row.len();
            if keyed {
                let object: Map<String, Value> = columns
                    .iter()
                    .take(width)
                    .enumerate()
                    .map(|(index, column)| (column.name.clone(), decode(row, index)))
                    .collect();
                Value::Object(object)
            } else {
                Value::Array((0..width).map(|index| decode(row, index)).collect())
            }
        })
        .collect()
}

/// JSON number for a float, `null` for NaN and infinities.
pub fn json_float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Binary payloads are rendered as lowercase hex.
pub fn json_bytes(bytes: &[u8]) -> Value {
    Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

/// Text when `bytes` are valid UTF-8, hex otherwise.
pub fn json_text_or_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(err) => json_bytes(err.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::{Connection, SqliteConnection};

    #[test]
    fn test_unique_names() {
        assert!(has_unique_names(&[ColumnInfo::named("a"), ColumnInfo::named("b")]));
        assert!(!has_unique_names(&[ColumnInfo::named("a"), ColumnInfo::named("a")]));
        assert!(!has_unique_names(&[ColumnInfo::named("")]));
    }

    #[test]
    fn test_scalar_helpers() {
        assert_eq!(json_float(1.5), json!(1.5));
        assert_eq!(json_float(f64::NAN), Value::Null);
        assert_eq!(json_bytes(&[0x00, 0xab, 0x10]), json!("00ab10"));
        assert_eq!(json_text_or_bytes(b"plain".to_vec()), json!("plain"));
        assert_eq!(json_text_or_bytes(vec![0xff, 0x41]), json!("ff41"));
    }

    #[tokio::test]
    async fn test_duplicate_names_fall_back_to_arrays() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let rows = sqlx::query("SELECT 1 AS v, 2 AS v")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        let columns = vec![ColumnInfo::named("v"), ColumnInfo::named("v")];
        let values = normalize_rows(&rows, &columns, |row, index| {
            json!(row.try_get::<i64, _>(index).unwrap())
        });
        assert_eq!(values, vec![json!([1, 2])]);
        conn.close().await.unwrap();
    }
}
