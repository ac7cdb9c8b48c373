//! Application error types.
//!
//! These are the failures reported as structured JSON before any streaming
//! begins. Failures after the response is committed to a stream are reported
//! in-band by the relay instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chatrelay_core::message::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON error body: `{"error": "<message>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Access denied: Unauthorized domain")]
    Forbidden,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A required setting is missing; carries the setting name for logs.
    #[error("Service configuration error")]
    Configuration(&'static str),

    /// The upstream answered with a non-success status before streaming.
    #[error("Failed to get response from AI service")]
    UpstreamRejected(StatusCode),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamRejected(status) => *status,
        }
    }

    /// Message exposed to the client. Parser details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(ValidationError::InvalidBody(_)) => "Invalid request body".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Validation(e) = &self {
            tracing::debug!(error = %e, "rejected chat request body");
        }
        let body = Json(ErrorResponse {
            error: self.public_message(),
        });
        (self.status(), body).into_response()
    }
}
