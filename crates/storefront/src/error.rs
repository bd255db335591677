//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_backend::{AuthProviderError, StoreError};
use serde_json::json;
use thiserror::Error;

use crate::services::{
    AuthError, CartError, CatalogError, CheckoutError, FlowError, OrderHistoryError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A signed-in shopper is required.
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Order history error: {0}")]
    Orders(#[from] OrderHistoryError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::services::Unauthenticated> for AppError {
    fn from(_: crate::services::Unauthenticated) -> Self {
        Self::Unauthenticated
    }
}

const SIGN_IN_NOTICE: &str = "Please sign in to continue";
const REMOTE_FAILURE: &str = "The store is temporarily unavailable, please try again";

fn store_status(error: &StoreError) -> (StatusCode, String) {
    match error {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
        _ => (StatusCode::BAD_GATEWAY, REMOTE_FAILURE.to_string()),
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl AppError {
    /// Status code and client-facing message. Internal details never leave
    /// the server.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Unauthenticated
            | Self::Cart(CartError::Unauthenticated)
            | Self::Checkout(CheckoutError::Unauthenticated) => {
                (StatusCode::UNAUTHORIZED, SIGN_IN_NOTICE.to_string())
            }
            Self::Cart(err) => match err {
                CartError::LineNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CartError::InvalidQuantity(_) | CartError::InvalidId(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CartError::Total(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
                CartError::Store(e) => store_status(e),
                _ => internal(),
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "Product not found".to_string()),
                CatalogError::InvalidId(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                CatalogError::Store(e) => store_status(e),
                CatalogError::Document(_) => internal(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::CONFLICT, err.to_string()),
                CheckoutError::Flow(FlowError::InvalidTransition { .. }) => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                CheckoutError::Flow(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
                CheckoutError::Total(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    crate::services::checkout::user_message(err),
                ),
                CheckoutError::RemoteWrite(_) | CheckoutError::PartialCommit { .. } => (
                    StatusCode::BAD_GATEWAY,
                    "Failed to place order. Please try again.".to_string(),
                ),
                CheckoutError::InvalidId(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                _ => internal(),
            },
            Self::Auth(err) => match err {
                AuthError::Provider(provider) => match provider {
                    AuthProviderError::InvalidCredentials => {
                        (StatusCode::UNAUTHORIZED, provider.to_string())
                    }
                    AuthProviderError::AccountExists => (StatusCode::CONFLICT, provider.to_string()),
                    AuthProviderError::WeakPassword | AuthProviderError::InvalidEmail => {
                        (StatusCode::UNPROCESSABLE_ENTITY, provider.to_string())
                    }
                    AuthProviderError::RateLimited => {
                        (StatusCode::TOO_MANY_REQUESTS, provider.to_string())
                    }
                    AuthProviderError::Rejected(_) => (
                        StatusCode::BAD_REQUEST,
                        "Authentication failed".to_string(),
                    ),
                    AuthProviderError::Http(_) | AuthProviderError::Parse(_) => {
                        (StatusCode::BAD_GATEWAY, REMOTE_FAILURE.to_string())
                    }
                },
                _ => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            },
            Self::Orders(err) => match err {
                OrderHistoryError::Store(e) => store_status(e),
                _ => internal(),
            },
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Session(_) | Self::Internal(_) => internal(),
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
///
/// Call this after successful authentication to associate errors with users.
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
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
