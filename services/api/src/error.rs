//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use insight_core::ports::PortError;
use tracing::error;

/// The primary error type for the `insight_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // --- Client errors ---
    #[error("User ID required")]
    MissingOwner,

    #[error("Invalid value for {0}: {1}")]
    InvalidInput(&'static str, String),

    #[error("Uploaded file exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported file format: {0}. Only PDF, TXT, and DOCX files are allowed")]
    UnsupportedFormat(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    // --- Pipeline failures ---
    #[error("Failed to store uploaded file: {0}")]
    StorageWriteFailed(String),

    #[error("Failed to extract text: {0}")]
    ExtractionFailed(String),

    #[error("Failed to generate insight: {0}")]
    GenerationFailed(String),

    // --- Infrastructure ---
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ApiError::NotFound(msg),
            PortError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Port(other),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingOwner | ApiError::InvalidInput(..) | ApiError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::StorageWriteFailed(_)
            | ApiError::ExtractionFailed(_)
            | ApiError::Config(_)
            | ApiError::Port(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        (status, self.to_string()).into_response()
    }
}
