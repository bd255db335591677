//! Shopper sign-in, sign-up and sign-out.
//!
//! Form-level checks happen here; everything else is the provider's call.
//! After each successful call the identity session is synced so the next
//! request sees the new identity.

use bazaar_backend::{AuthProviderError, ProviderCredential};
use bazaar_core::{Email, EmailError, Identity};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, instrument};

use super::identity::IdentitySession;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("please enter your email address")]
    MissingEmail,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error(transparent)]
    Provider(#[from] AuthProviderError),
}

/// Sign-up form contents.
pub struct SignUp {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

/// Authentication actions for one client's session.
pub struct AuthService<'a> {
    session: &'a IdentitySession,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(session: &'a IdentitySession) -> Self {
        Self { session }
    }

    /// # Errors
    ///
    /// Returns an error if the email is malformed or the provider refuses.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let email = Email::parse(email)?;
        let identity = self.session.provider().sign_in(&email, password).await?;
        self.session.sync();
        info!(user_id = %identity.uid, "Signed in");
        Ok(identity)
    }

    /// Create an account and sign in to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the passwords differ, the password is shorter
    /// than [`MIN_PASSWORD_LENGTH`], or the provider refuses.
    #[instrument(skip_all)]
    pub async fn sign_up(&self, form: &SignUp) -> Result<Identity, AuthError> {
        let email = Email::parse(&form.email)?;
        let password = form.password.expose_secret();
        if password != form.confirm_password.expose_secret() {
            return Err(AuthError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }
        let identity = self
            .session
            .provider()
            .sign_up(&email, &form.password)
            .await?;
        self.session.sync();
        info!(user_id = %identity.uid, "Account created");
        Ok(identity)
    }

    /// # Errors
    ///
    /// Returns an error if the provider does not accept the credential.
    #[instrument(skip_all, fields(provider = %credential.provider_id))]
    pub async fn sign_in_with_provider(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Identity, AuthError> {
        let identity = self
            .session
            .provider()
            .sign_in_with_provider(credential)
            .await?;
        self.session.sync();
        info!(user_id = %identity.uid, "Signed in with provider");
        Ok(identity)
    }

    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.session.provider().sign_out().await?;
        self.session.sync();
        info!("Signed out");
        Ok(())
    }

    /// Email a reset link. Unknown addresses succeed silently.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingEmail`] for a blank address.
    #[instrument(skip_all)]
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::MissingEmail);
        }
        let email = Email::parse(email)?;
        self.session
            .provider()
            .send_password_reset(&email)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_backend::AuthConnector;
    use bazaar_backend::memory::MemoryAuth;
    use bazaar_core::UserId;

    fn secret(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    fn sign_up_form(password: &str, confirm: &str) -> SignUp {
        SignUp {
            email: "new@example.com".to_string(),
            password: secret(password),
            confirm_password: secret(confirm),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_out() {
        let auth = MemoryAuth::new();
        let session = IdentitySession::start(auth.connect());
        let service = AuthService::new(&session);

        let identity = service
            .sign_up(&sign_up_form("secret1", "secret1"))
            .await
            .unwrap();
        assert_eq!(session.current(), Some(identity));

        service.sign_out().await.unwrap();
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_checks_form_first() {
        let auth = MemoryAuth::new();
        let session = IdentitySession::start(auth.connect());
        let service = AuthService::new(&session);

        assert!(matches!(
            service.sign_up(&sign_up_form("secret1", "secret2")).await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            service.sign_up(&sign_up_form("abc", "abc")).await,
            Err(AuthError::WeakPassword)
        ));
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let auth = MemoryAuth::new();
        let email = Email::parse("a@b.c").unwrap();
        auth.create_account(&email, &secret("secret1")).unwrap();
        let session = IdentitySession::start(auth.connect());
        let service = AuthService::new(&session);

        let err = service.sign_in("a@b.c", &secret("nope!!")).await;
        assert!(matches!(
            err,
            Err(AuthError::Provider(AuthProviderError::InvalidCredentials))
        ));
        let identity = service.sign_in("a@b.c", &secret("secret1")).await.unwrap();
        assert_eq!(session.require().unwrap(), identity);
    }

    #[tokio::test]
    async fn test_provider_sign_in() {
        let auth = MemoryAuth::new();
        let identity = Identity::new(UserId::new("g1"), Email::parse("g@b.c").unwrap());
        auth.register_provider_identity("google.com", "tok", identity.clone());
        let session = IdentitySession::start(auth.connect());

        let credential = ProviderCredential {
            provider_id: "google.com".to_string(),
            id_token: secret("tok"),
        };
        let signed_in = AuthService::new(&session)
            .sign_in_with_provider(&credential)
            .await
            .unwrap();
        assert_eq!(signed_in, identity);
        assert_eq!(session.current(), Some(identity));
    }

    #[tokio::test]
    async fn test_password_reset_requires_email() {
        let auth = MemoryAuth::new();
        let session = IdentitySession::start(auth.connect());
        let service = AuthService::new(&session);

        assert!(matches!(
            service.send_password_reset("  ").await,
            Err(AuthError::MissingEmail)
        ));
        service.send_password_reset("who@b.c").await.unwrap();
        assert!(auth.password_resets().is_empty());

        auth.create_account(&Email::parse("who@b.c").unwrap(), &secret("secret1"))
            .unwrap();
        service.send_password_reset("who@b.c").await.unwrap();
        assert_eq!(auth.password_resets().len(), 1);
    }
}
