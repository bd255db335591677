//! Admin login and logout.
//!
//! Credentials are checked against the auth provider on a throwaway
//! connection; only the administrator's uid makes it into the session.

use axum::{Json, extract::State, http::StatusCode};
use bazaar_core::Email;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<CurrentAdmin>> {
    let email = Email::parse(&form.email)?;

    let provider = state.auth().connect();
    let identity = provider.sign_in(&email, &form.password).await?;
    // The panel never acts as the admin against the provider.
    if let Err(e) = provider.sign_out().await {
        tracing::warn!(error = %e, "Failed to release provider session");
    }

    if identity.uid != state.config().admin_uid {
        tracing::warn!(uid = %identity.uid, "Login refused for non-admin account");
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    let admin = CurrentAdmin {
        uid: identity.uid,
        email: identity.email,
    };
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, &admin).await?;
    set_sentry_user(&admin.uid, Some(admin.email.as_str()));
    tracing::info!(uid = %admin.uid, "Admin logged in");

    Ok(Json(admin))
}

#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    session.flush().await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
