// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::TokenError;
use crate::store::StoreError;
use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream identity provider error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Conflict(_) => "AUTH_409",
            AppError::InvalidCredentials => "AUTH_001",
            AppError::Unauthorized(_) => "AUTH_002",
            AppError::Forbidden(_) => "AUTH_003",
            AppError::BadRequest(_) => "REQ_001",
            AppError::NotFound(_) => "RES_404",
            AppError::Validation(_) => "VAL_001",
            AppError::ServiceUnavailable(_) => "SVC_001",
            AppError::Gateway(_) => "GW_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Conflict(_) => "Resource already exists".to_string(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::Forbidden(_) => "Insufficient permissions".to_string(),
            AppError::BadRequest(_) => "Bad request".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Validation(_) => "Invalid input provided".to_string(),
            AppError::ServiceUnavailable(_) => "Service unavailable".to_string(),
            AppError::Gateway(_) => "Identity provider unavailable".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    fn exposes_detail(&self) -> bool {
        !matches!(self, AppError::Internal(_) | AppError::Gateway(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        match &self {
            AppError::Internal(detail) => tracing::error!(code = error_code, %detail, "request failed"),
            AppError::Gateway(detail) => tracing::warn!(code = error_code, %detail, "identity provider failure"),
            _ => tracing::debug!(code = error_code, error = %self, "request rejected"),
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) && self.exposes_detail() {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { field } => AppError::Conflict(format!("{field} already taken")),
            StoreError::NotFound => AppError::NotFound("Unknown user".to_string()),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(format!("token signing failed: {msg}")),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}
