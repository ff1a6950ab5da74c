//! Application error taxonomy.
//!
//! Every failure that crosses the HTTP boundary is one of these kinds. Native
//! driver errors never leave the gateway; they are classified into a dialect
//! kind first (see the gateway's error translator).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across all crates.
pub type AppResult<T> = Result<T, AppError>;

/// Gateway error kinds.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced connection, blob or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An embedded-file URI does not resolve to an uploaded blob.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Request body or parameters failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Source kind outside the supported enumeration.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// The remote engine rejected the credentials.
    #[error("authentication failed: {0}")]
    DialectAuthFailed(String),

    /// Connection, network or server availability failure.
    #[error("data source unreachable: {0}")]
    DialectUnreachable(String),

    /// Unknown catalog/database or a similarly malformed request.
    #[error("bad request to data source: {0}")]
    DialectBadRequest(String),

    /// Any other failure while running SQL. The driver message is kept verbatim.
    #[error("{0}")]
    ExecutionFailed(String),

    /// The connection registry store failed.
    #[error("registry error: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ValidationFailed(_) => "VALIDATION_FAILED",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UnsupportedDialect(_) => "UNSUPPORTED_DIALECT",
            AppError::DialectAuthFailed(_) => "DIALECT_AUTH_FAILED",
            AppError::DialectUnreachable(_) => "DIALECT_UNREACHABLE",
            AppError::DialectBadRequest(_) => "DIALECT_BAD_REQUEST",
            AppError::ExecutionFailed(_) => "EXECUTION_FAILED",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the error is surfaced with.
    ///
    /// `ValidationFailed` deliberately reuses 404: a missing blob is reported
    /// the same way as any other missing resource.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::ValidationFailed(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_)
            | AppError::UnsupportedDialect(_)
            | AppError::DialectBadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DialectAuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::DialectUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExecutionFailed(_) | AppError::Persistence(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Wraps a registry store failure.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        AppError::Persistence(err.to_string())
    }

    /// Wraps an unexpected internal failure (I/O on the bucket, serialization).
    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
