//! The authentication provider seam.
//!
//! A provider instance represents one signed-in client: it holds that
//! client's identity and pushes changes through a watch channel. An
//! [`AuthConnector`] hands out a fresh provider per client.

use std::sync::Arc;

use async_trait::async_trait;
use bazaar_core::{Email, Identity};
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;

/// Errors returned by an [`AuthProvider`].
#[derive(Debug, Error)]
pub enum AuthProviderError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    AccountExists,

    #[error("password is too weak")]
    WeakPassword,

    #[error("email address is invalid")]
    InvalidEmail,

    #[error("too many attempts, try again later")]
    RateLimited,

    /// Any other provider-side refusal, with the provider's reason.
    #[error("auth provider rejected the request: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A credential minted by a federated identity provider (e.g. a Google ID
/// token obtained by the browser's popup flow).
#[derive(Debug, Clone)]
pub struct ProviderCredential {
    /// Provider id, e.g. `google.com`.
    pub provider_id: String,
    pub id_token: SecretString,
}

/// One client's connection to the auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Identity pushes for this client. Holds `None` while signed out.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;

    /// The identity right now.
    fn current(&self) -> Option<Identity> {
        self.watch_identity().borrow().clone()
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError>;

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError>;

    async fn sign_in_with_provider(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Identity, AuthProviderError>;

    async fn sign_out(&self) -> Result<(), AuthProviderError>;

    /// Ask the provider to email a password reset link.
    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthProviderError>;
}

/// Creates per-client [`AuthProvider`]s sharing one account directory.
pub trait AuthConnector: Send + Sync {
    fn connect(&self) -> Arc<dyn AuthProvider>;
}
