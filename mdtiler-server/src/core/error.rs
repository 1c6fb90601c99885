use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for mdtiler operations
///
/// Cache-layer faults (store I/O, stale or corrupt snapshots, rejected
/// writes) are absorbed inside the store and reader and degrade to the
/// fresh-open path; only source and request errors cross the HTTP boundary.
#[derive(Debug, Error)]
pub enum TilerError {
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Dimension not found: {0}")]
    DimensionNotFound(String),

    #[error("Failed to open dataset: {0}")]
    SourceOpenFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TilerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::VariableNotFound(_) | Self::DimensionNotFound(_) => StatusCode::NOT_FOUND,
            Self::SourceOpenFailed(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implement IntoResponse for Axum integration
impl IntoResponse for TilerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for mdtiler operations
pub type Result<T> = std::result::Result<T, TilerError>;
