//! Middleware components.

pub mod request_id;

// Re-export commonly used types
pub use request_id::{request_id_middleware, RequestContext, REQUEST_ID_HEADER};
