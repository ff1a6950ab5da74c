//! Introspection models.
//!
//! Schemas, tables and entities are all reported as named items with a total.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::query::ColumnInfo;

/// A named catalog object (schema, table, entity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedItem {
    pub name: String,
}

impl From<String> for NamedItem {
    fn from(name: String) -> Self {
        Self { name }
    }
}

/// Optional schema filter for table and column listings.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SchemaFilter {
    /// Schema or database name; the dialect default applies when absent.
    pub schema: Option<String>,
}

/// Schemas of a data source.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchemaList {
    pub schemas: Vec<NamedItem>,
    pub total: usize,
}

/// Tables of a schema.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TableList {
    pub tables: Vec<NamedItem>,
    pub total: usize,
}

/// Entities of a connection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntityList {
    pub entities: Vec<NamedItem>,
    pub total: usize,
}

/// Columns of a table.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ColumnList {
    pub columns: Vec<ColumnInfo>,
    pub total: usize,
}

fn named(names: Vec<String>) -> (Vec<NamedItem>, usize) {
    let total = names.len();
    (names.into_iter().map(NamedItem::from).collect(), total)
}

impl From<Vec<String>> for SchemaList {
    fn from(names: Vec<String>) -> Self {
        let (schemas, total) = named(names);
        Self { schemas, total }
    }
}

impl From<Vec<String>> for TableList {
    fn from(names: Vec<String>) -> Self {
        let (tables, total) = named(names);
        Self { tables, total }
    }
}

impl From<Vec<String>> for EntityList {
    fn from(names: Vec<String>) -> Self {
        let (entities, total) = named(names);
        Self { entities, total }
    }
}

impl From<Vec<ColumnInfo>> for ColumnList {
    fn from(columns: Vec<ColumnInfo>) -> Self {
        let total = columns.len();
        Self { columns, total }
    }
}
