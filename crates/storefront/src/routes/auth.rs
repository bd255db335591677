//! Authentication route handlers.
//!
//! Sign-in state lives in the shopper's client, so these handlers only talk
//! to its identity session; the browser session just keeps pointing at the
//! same client.

use axum::{Json, http::StatusCode};
use bazaar_backend::ProviderCredential;
use bazaar_core::Identity;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::Shopper;
use crate::services::{AuthService, SignUp};

/// Email/password form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

/// Sign-up form data.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

/// Federated sign-in: an ID token the browser got from the provider popup.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderForm {
    pub provider_id: String,
    pub id_token: SecretString,
}

#[derive(Deserialize)]
pub struct PasswordResetForm {
    #[serde(default)]
    pub email: String,
}

/// Who is signed in.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub identity: Option<Identity>,
}

fn signed_in(identity: Identity) -> Json<MeResponse> {
    set_sentry_user(&identity.uid, Some(identity.email.as_str()));
    Json(MeResponse {
        identity: Some(identity),
    })
}

#[instrument(skip_all)]
pub async fn login(shopper: Shopper, Json(form): Json<LoginForm>) -> Result<Json<MeResponse>> {
    let identity = AuthService::new(shopper.client.session())
        .sign_in(&form.email, &form.password)
        .await?;
    Ok(signed_in(identity))
}

#[instrument(skip_all)]
pub async fn signup(
    shopper: Shopper,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<MeResponse>)> {
    let identity = AuthService::new(shopper.client.session())
        .sign_up(&SignUp {
            email: form.email,
            password: form.password,
            confirm_password: form.confirm_password,
        })
        .await?;
    Ok((StatusCode::CREATED, signed_in(identity)))
}

#[instrument(skip_all, fields(provider = %form.provider_id))]
pub async fn provider(
    shopper: Shopper,
    Json(form): Json<ProviderForm>,
) -> Result<Json<MeResponse>> {
    let credential = ProviderCredential {
        provider_id: form.provider_id,
        id_token: form.id_token,
    };
    let identity = AuthService::new(shopper.client.session())
        .sign_in_with_provider(&credential)
        .await?;
    Ok(signed_in(identity))
}

/// Sign out. The cart view empties as soon as the identity is gone; nothing
/// is deleted remotely.
#[instrument(skip_all)]
pub async fn logout(shopper: Shopper) -> Result<StatusCode> {
    AuthService::new(shopper.client.session())
        .sign_out()
        .await?;
    shopper.client.reset_checkout();
    shopper.client.cart().set_open(false);
    clear_sentry_user();
    add_breadcrumb("auth", "Signed out", None);
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn password_reset(
    shopper: Shopper,
    Json(form): Json<PasswordResetForm>,
) -> Result<StatusCode> {
    AuthService::new(shopper.client.session())
        .send_password_reset(&form.email)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn me(shopper: Shopper) -> Json<MeResponse> {
    Json(MeResponse {
        identity: shopper.client.session().current(),
    })
}
