//! # Error Handling
//!
//! This module defines the server's error type and how it turns into HTTP responses.
//!
//! ## Disclosure policy
//! Kiosk endpoints are public and shared. Lookup and ceremony failures therefore
//! carry one generic message each; the specific reason is logged server-side and
//! never placed in the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
///
/// The `#[from]` attributes let `?` convert library errors (SQLx, webauthn-rs,
/// serde_json) into `AppError` automatically.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// WebAuthn protocol errors outside a kiosk ceremony (configuration, option generation)
    #[error("WebAuthn error: {0}")]
    WebAuthn(#[from] webauthn_rs::prelude::WebauthnError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed input, e.g. a passkey that is not six digits
    #[error("{0}")]
    Validation(String),

    /// Unknown or inactive passkey
    #[error("Invalid passkey")]
    InvalidPasskey,

    /// Too many failed passkey lookups from this client
    #[error("Too many attempts. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Any biometric ceremony failure, deliberately without detail
    #[error("Biometric verification failed")]
    AuthenticationFailed,

    /// No class is running (or about to) at the kiosk's location
    #[error("No active class at this location")]
    NoActiveSchedule,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::WebAuthn(e) => {
                tracing::error!("WebAuthn error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Authentication error".to_string())
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string())
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidPasskey => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::AuthenticationFailed => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NoActiveSchedule => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::InvalidPasskey, StatusCode::UNAUTHORIZED),
            (AppError::RateLimited { retry_after_secs: 30 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::AuthenticationFailed, StatusCode::UNAUTHORIZED),
            (AppError::NoActiveSchedule, StatusCode::CONFLICT),
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_rate_limited_message_mentions_wait() {
        let message = AppError::RateLimited { retry_after_secs: 42 }.to_string();
        assert!(message.contains("42 seconds"));
    }
}
