//! Authentication extractor for admin.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Extractor that requires the configured administrator.
///
/// Rejects with 401 when nobody is logged in and with 403 when the session
/// belongs to any other account.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> String {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let admin: CurrentAdmin = session
            .get(session_keys::CURRENT_ADMIN)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))?;

        if admin.uid != state.config().admin_uid {
            tracing::warn!(uid = %admin.uid, "Non-admin session rejected");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(admin))
    }
}
