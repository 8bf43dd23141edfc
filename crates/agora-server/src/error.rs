//! Error types for the brain HTTP API.
//!
//! [`ApiError`] unifies all failure modes of the handlers into a single enum
//! that converts into an Axum response with a JSON body of the form
//! `{"error": message, "status": code}`.

use agora_brain::CoordinationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the brain API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The coordination service was never constructed.
    #[error("brain service not initialized")]
    ServiceNotInitialized,

    /// No brain exists for the requested agent.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// The request body is missing a field or cannot be read.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The agent id or name is already taken.
    #[error("agent already registered: {0}")]
    Conflict(String),
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        match err {
            CoordinationError::UnknownAgent(id) => Self::NotFound(id),
            CoordinationError::DuplicateAgent(id) => Self::Conflict(id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ServiceNotInitialized => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
