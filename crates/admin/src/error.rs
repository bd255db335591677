//! Unified error handling with Sentry integration.
//!
//! All route handlers return `Result<T, AppError>`. Server errors are
//! captured to Sentry; the client only ever sees `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_backend::{AuthProviderError, StoreError};
use bazaar_core::EmailError;
use serde_json::json;
use thiserror::Error;

use crate::services::EditorError;

/// Application-level error type for admin.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Catalog editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthProviderError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Not signed in to the panel.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but not as the administrator.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

const REMOTE_FAILURE: &str = "The store is temporarily unavailable, please try again";

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Editor(err) => match err {
                EditorError::Invalid(_) | EditorError::InvalidId(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                EditorError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                EditorError::ConfirmationRequired => (StatusCode::CONFLICT, err.to_string()),
                EditorError::Store(StoreError::NotFound(_)) => {
                    (StatusCode::NOT_FOUND, "Not found".to_string())
                }
                EditorError::Store(_) => (StatusCode::BAD_GATEWAY, REMOTE_FAILURE.to_string()),
                EditorError::Document(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
            Self::Auth(err) => match err {
                AuthProviderError::Http(_) | AuthProviderError::Parse(_) => {
                    (StatusCode::BAD_GATEWAY, REMOTE_FAILURE.to_string())
                }
                AuthProviderError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
                // Everything else is a failed login; don't say which part was wrong.
                _ => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid email or password".to_string(),
                ),
            },
            Self::InvalidEmail(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Session(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
