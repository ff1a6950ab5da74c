//! SQL query models.
//!
//! Contains models for pass-through SQL execution.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query string for the execute endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// SQL statement, executed exactly as given.
    pub query: String,
    /// Client-side page size. Echoed, not enforced.
    pub limit: Option<u64>,
    /// Client-side page offset. Echoed, not enforced.
    pub offset: Option<u64>,
    /// Persist mutations immediately. When false the statement runs in a
    /// transaction that is rolled back.
    #[serde(default = "default_commit")]
    pub commit: bool,
}

fn default_commit() -> bool {
    true
}

/// Result of a SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// Rows as objects keyed by column name, or positional arrays when the
    /// column names are ambiguous.
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<serde_json::Value>,

    /// Column descriptors, empty when the statement reports none.
    pub columns: Vec<ColumnInfo>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Number of rows affected (for statements without a result set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    /// Statement execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,

    /// The literal statement text.
    pub query: String,

    /// Owning connection id.
    pub connection_id: String,

    /// Target entity (informational).
    pub entity_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Declared or reported data type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Whether the column is nullable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    /// 1-based position in the table or result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<u32>,
}

impl ColumnInfo {
    /// Creates a descriptor with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            nullable: None,
            ordinal_position: None,
        }
    }
}

/// Normalized output of one statement, before request context is attached.
#[derive(Debug, Clone, Default)]
pub struct StatementOutput {
    pub rows: Vec<serde_json::Value>,
    pub columns: Vec<ColumnInfo>,
    pub affected_rows: Option<u64>,
}

impl QueryResult {
    /// Attaches request context to a statement output.
    pub fn from_output(
        output: StatementOutput,
        query: impl Into<String>,
        connection_id: impl Into<String>,
        entity_name: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            row_count: output.rows.len(),
            rows: output.rows,
            columns: output.columns,
            affected_rows: output.affected_rows,
            execution_time_ms,
            query: query.into(),
            connection_id: connection_id.into(),
            entity_name: entity_name.into(),
            limit: None,
            offset: None,
        }
    }

    /// Echoes client pagination hints.
    pub fn with_page(mut self, limit: Option<u64>, offset: Option<u64>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Metadata stored with a query log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogMetadata {
    pub entity_name: String,
    pub commit: bool,
    pub status: String,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_defaults_to_true() {
        let params: QueryParams = serde_json::from_str(r#"{"query":"SELECT 1"}"#).unwrap();
        assert!(params.commit);
        assert!(params.limit.is_none());
    }

    #[test]
    fn test_from_output_counts_rows() {
        let output = StatementOutput {
            rows: vec![serde_json::json!({"id": 1}), serde_json::json!({"id": 2})],
            columns: vec![ColumnInfo::named("id")],
            affected_rows: None,
        };
        let result = QueryResult::from_output(output, "SELECT id FROM t", "c1", "t", 3)
            .with_page(Some(10), None);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.limit, Some(10));

        let body = serde_json::to_value(&result).unwrap();
        assert!(body.get("offset").is_none());
        assert!(body.get("affected_rows").is_none());
        assert_eq!(body["columns"][0], serde_json::json!({"name": "id"}));
    }
}
