//! Admin account bootstrap.
//!
//! The panel admits exactly one uid, so the account is created here and
//! its uid copied into `ADMIN_UID`.

use bazaar_backend::{AuthProviderError, Backend};
use bazaar_core::{Email, EmailError, UserId};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Auth provider error: {0}")]
    Provider(#[from] AuthProviderError),
}

/// Create the admin account and return its uid.
///
/// # Errors
///
/// Returns an error if the email is malformed or the provider refuses the
/// account (existing email, weak password).
pub async fn create(
    backend: &Backend,
    email: &str,
    password: String,
) -> Result<UserId, AdminError> {
    let email = Email::parse(email)?;
    let password = SecretString::from(password);

    let provider = backend.auth.connect();
    let identity = provider.sign_up(&email, &password).await?;
    provider.sign_out().await?;

    tracing::info!("Admin account created: {}", identity.email);
    tracing::info!("Set ADMIN_UID={}", identity.uid);
    Ok(identity.uid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_signable_uid() {
        let backend = Backend::memory();
        let uid = create(&backend, "admin@example.com", "admin-pass".to_string())
            .await
            .unwrap();

        let provider = backend.auth.connect();
        let identity = provider
            .sign_in(
                &Email::parse("admin@example.com").unwrap(),
                &SecretString::from("admin-pass".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(identity.uid, uid);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_weak_passwords() {
        let backend = Backend::memory();
        create(&backend, "admin@example.com", "admin-pass".to_string())
            .await
            .unwrap();
        assert!(matches!(
            create(&backend, "admin@example.com", "admin-pass".to_string()).await,
            Err(AdminError::Provider(AuthProviderError::AccountExists))
        ));
        assert!(matches!(
            create(&backend, "other@example.com", "short".to_string()).await,
            Err(AdminError::Provider(AuthProviderError::WeakPassword))
        ));
        assert!(matches!(
            create(&backend, "not-an-email", "admin-pass".to_string()).await,
            Err(AdminError::InvalidEmail(_))
        ));
    }
}
