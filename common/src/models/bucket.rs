//! Bucket (blob store) models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response for an uploaded blob.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BucketItem {
    /// Stored file name (`{id}.{ext}`). Pass it as the `connection_uri` of a
    /// sqlite connection.
    pub uid: String,
    /// Original filename as uploaded.
    pub filename: Option<String>,
}

/// Metadata kept alongside a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BlobMetadata {
    /// Size of the stored content in bytes.
    pub file_size: u64,
    /// Original filename as uploaded.
    pub filename: Option<String>,
    /// Name of the file inside the bucket directory (`{uid}{ext}`).
    pub stored_name: String,
}
