use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Field-level validation failures, keyed by field name.
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    /// Write attempted before the tenant's admin claimed the board.
    #[error("Admin not configured")]
    AdminNotConfigured,

    /// Registration attempted when the tenant already holds a credential.
    #[error("Admin already setup")]
    AlreadyConfigured,

    /// Absent, mismatched or expired one-time login code. Deliberately a
    /// single variant so callers cannot tell which check failed.
    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("WebAuthn error: {0}")]
    Webauthn(#[from] webauthn_rs::prelude::WebauthnError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(fields) => (StatusCode::BAD_REQUEST, json!({ "error": fields })),
            AppError::AdminNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Board not set up" }),
            ),
            AppError::AlreadyConfigured => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Admin already setup" }),
            ),
            AppError::InvalidOrExpiredCode => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid or expired code" }),
            ),
            AppError::EmailDelivery(e) => {
                tracing::error!("Email delivery error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to send email" }),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Webauthn(e) => {
                // Never reveal which ceremony check failed.
                tracing::error!("WebAuthn error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "Verification failed" }),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
