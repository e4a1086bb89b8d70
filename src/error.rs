use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the rate limiting service.
///
/// `StoreUnavailable` and `InvalidRule` are the only failures the limiter
/// core can produce. `Validation` and `Config` belong to the HTTP and
/// startup layers.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// The shared store could not be reached or the batch did not execute
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-positive limit or window supplied for a rule
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Request body failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Process configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RateLimitError>;

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for RateLimitError {
    fn from(err: validator::ValidationErrors) -> Self {
        RateLimitError::Validation(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    pub fn from_error(err: &RateLimitError) -> Self {
        match err {
            RateLimitError::StoreUnavailable(msg) => Self::new("service_unavailable", msg, 503),
            RateLimitError::InvalidRule(msg) => Self::new("invalid_rule", msg, 422),
            RateLimitError::Validation(msg) => Self::new("validation_error", msg, 422),
            RateLimitError::Config(msg) => Self::new("configuration_error", msg, 500),
        }
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from_error(&self);
        let status =
            StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
