//! Connection registry models.
//!
//! A connection is a named reference to a data source plus the source kind
//! needed to talk to it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::AppError;

/// Supported data source kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SourceKind {
    /// Embedded file database (SQLite) stored in the bucket.
    Sqlite,
    /// PostgreSQL wire protocol.
    Postgres,
    /// MySQL wire protocol.
    Mysql,
    /// Generic HTTP API source.
    Api,
}

impl SourceKind {
    /// All supported kinds, in catalog order.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Sqlite,
        SourceKind::Postgres,
        SourceKind::Mysql,
        SourceKind::Api,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Sqlite => "sqlite",
            SourceKind::Postgres => "postgres",
            SourceKind::Mysql => "mysql",
            SourceKind::Api => "api",
        }
    }

    /// Whether the connection URI references a blob in the bucket.
    pub fn is_embedded_file(&self) -> bool {
        matches!(self, SourceKind::Sqlite)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SourceKind::Sqlite),
            "postgres" => Ok(SourceKind::Postgres),
            "mysql" => Ok(SourceKind::Mysql),
            "api" => Ok(SourceKind::Api),
            other => Err(AppError::UnsupportedDialect(other.to_string())),
        }
    }
}

impl TryFrom<String> for SourceKind {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Stored connection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectionRecord {
    /// Generated connection identifier.
    pub uid: String,
    /// Source kind.
    pub source: SourceKind,
    /// Display name.
    pub name: String,
    /// Blob filename for `sqlite`, DSN for wire protocols, base URL for `api`.
    pub connection_uri: String,
}

/// Request body for registering a connection.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateConnectionRequest {
    /// Source kind.
    pub source: SourceKind,
    /// Display name.
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    /// Connection URI.
    #[validate(length(min = 1, message = "connection_uri is required"))]
    pub connection_uri: String,
}

impl CreateConnectionRequest {
    /// Converts the request into a record with the given uid.
    pub fn into_record(self, uid: String) -> ConnectionRecord {
        ConnectionRecord {
            uid,
            source: self.source,
            name: self.name,
            connection_uri: self.connection_uri,
        }
    }
}

/// Partial update. Unset fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateConnectionRequest {
    pub source: Option<SourceKind>,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "connection_uri must not be empty"))]
    pub connection_uri: Option<String>,
}

impl UpdateConnectionRequest {
    /// Merges the supplied fields over `existing`.
    pub fn merge(&self, existing: &ConnectionRecord) -> ConnectionRecord {
        ConnectionRecord {
            uid: existing.uid.clone(),
            source: self.source.unwrap_or(existing.source),
            name: self.name.clone().unwrap_or_else(|| existing.name.clone()),
            connection_uri: self
                .connection_uri
                .clone()
                .unwrap_or_else(|| existing.connection_uri.clone()),
        }
    }

    /// True when the patch touches the fields blob validation depends on.
    pub fn touches_location(&self) -> bool {
        self.source.is_some() || self.connection_uri.is_some()
    }
}

/// Connection list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionList {
    pub connections: Vec<ConnectionRecord>,
    pub total: usize,
}

impl From<Vec<ConnectionRecord>> for ConnectionList {
    fn from(connections: Vec<ConnectionRecord>) -> Self {
        let total = connections.len();
        Self { connections, total }
    }
}
