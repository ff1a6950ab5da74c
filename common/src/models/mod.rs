//! Shared data models.

pub mod bucket;
pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use bucket::{BlobMetadata, BucketItem};
pub use connection::{
    ConnectionList, ConnectionRecord, CreateConnectionRequest, SourceKind, UpdateConnectionRequest,
};
pub use query::{ColumnInfo, QueryLogMetadata, QueryParams, QueryResult, StatementOutput};
pub use schema::{ColumnList, EntityList, NamedItem, SchemaFilter, SchemaList, TableList};
