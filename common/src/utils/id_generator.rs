//! Unique ID generator.
//!
//! Provides utilities for generating unique identifiers.

use uuid::Uuid;

/// Generates unique identifiers for various entities.
pub struct IdGenerator;

impl IdGenerator {
    /// Generates a unique connection uid.
    pub fn connection_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a unique blob id.
    pub fn blob_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a unique query log id.
    pub fn query_log_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a unique request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }
}
