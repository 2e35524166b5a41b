use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// Record absent or owned by another account; the two cases are
    /// indistinguishable to the caller.
    NotFound(String),
    /// A required field is missing or empty; carries field-level detail.
    Validation { field: &'static str, message: String },
    BadRequest(String),
    TooManyRequests(String),
    /// Storage or downstream temporarily unavailable; safe to retry.
    Transient(String),
    Database(sqlx::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Validation { field, message } => {
                write!(f, "validation failed on {field}: {message}")
            }
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::TooManyRequests(msg) => write!(f, "too many requests: {msg}"),
            AppError::Transient(msg) => write!(f, "temporarily unavailable: {msg}"),
            AppError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound(msg) => {
                tracing::warn!(error_type = "not_found", message = %msg, "Responding with 404");
                (StatusCode::NOT_FOUND, json!({ "error": msg }))
            }
            AppError::Validation { field, message } => {
                tracing::warn!(error_type = "validation", field, message = %message, "Responding with 400");
                (StatusCode::BAD_REQUEST, json!({ "error": message, "field": field }))
            }
            AppError::BadRequest(msg) => {
                tracing::warn!(error_type = "bad_request", message = %msg, "Responding with 400");
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            AppError::TooManyRequests(msg) => {
                tracing::warn!(error_type = "too_many_requests", message = %msg, "Responding with 429");
                (StatusCode::TOO_MANY_REQUESTS, json!({ "error": msg }))
            }
            AppError::Transient(msg) => {
                tracing::warn!(error_type = "transient", message = %msg, "Responding with 503");
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": msg, "retryable": true }))
            }
            AppError::Database(e) => {
                tracing::error!(error_type = "database", error = %e, "Responding with 500");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}
