//! Custom error types for the timer API

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::service::SessionError;

/// Custom error type for the timer API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body or query could not be parsed
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<Value>,
    },

    /// Session operation failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            message: "Invalid input".to_string(),
            details: Some(Value::String(rejection.body_text())),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest {
            message: "Invalid query".to_string(),
            details: Some(Value::String(rejection.body_text())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest { message, details } => {
                (StatusCode::BAD_REQUEST, error_body(&message, details))
            }
            ApiError::Session(SessionError::InvalidInput(message)) => {
                (StatusCode::BAD_REQUEST, error_body(&message, None))
            }
            ApiError::Session(SessionError::NotFound) => (
                StatusCode::NOT_FOUND,
                error_body("Invalid or expired session", None),
            ),
            ApiError::Session(SessionError::Conflict { session_id }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Active session already exists",
                    "sessionId": session_id,
                }),
            ),
            ApiError::Session(SessionError::Denied(reason)) => (
                StatusCode::BAD_REQUEST,
                error_body(
                    "Extension request denied",
                    Some(json!({ "reason": reason })),
                ),
            ),
            ApiError::Session(SessionError::Store(e)) => {
                error!("Session store failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("Internal server error", None),
                )
            }
            ApiError::Session(SessionError::Gate(e)) => {
                error!("Extension gate failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("Failed to process extension request", None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: &str, details: Option<Value>) -> Value {
    match details {
        Some(details) => json!({ "error": message, "details": details }),
        None => json!({ "error": message }),
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
