use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use bazaar_core::{Email, Identity, UserId};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::debug;

use crate::auth::{AuthConnector, AuthProvider, AuthProviderError, ProviderCredential};
use crate::document::auto_id;

/// Same minimum the hosted provider enforces.
const MIN_PASSWORD_LENGTH: usize = 6;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory account directory acting as an [`AuthConnector`].
///
/// Cloning shares the directory.
#[derive(Clone, Default)]
pub struct MemoryAuth {
    directory: Arc<Directory>,
}

#[derive(Default)]
struct Directory {
    accounts: Mutex<HashMap<String, Account>>,
    federated: Mutex<HashMap<(String, String), Identity>>,
    resets: Mutex<Vec<Email>>,
    sessions: Mutex<Vec<Weak<watch::Sender<Option<Identity>>>>>,
}

struct Account {
    identity: Identity,
    password: SecretString,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an email/password account with a generated uid.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthProviderError::WeakPassword`] or
    /// [`AuthProviderError::AccountExists`].
    pub fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        self.create_account_with_uid(UserId::new(auto_id()), email, password)
    }

    /// Create an account with a fixed uid, e.g. the configured admin.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthProviderError::WeakPassword`] or
    /// [`AuthProviderError::AccountExists`].
    pub fn create_account_with_uid(
        &self,
        uid: UserId,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthProviderError::WeakPassword);
        }
        let mut accounts = lock(&self.directory.accounts);
        let key = email.normalized();
        if accounts.contains_key(&key) {
            return Err(AuthProviderError::AccountExists);
        }
        let identity = Identity::new(uid, email.clone());
        accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password: password.clone(),
            },
        );
        Ok(identity)
    }

    /// Make `id_token` from `provider_id` resolve to `identity`.
    pub fn register_provider_identity(&self, provider_id: &str, id_token: &str, identity: Identity) {
        lock(&self.directory.federated)
            .insert((provider_id.to_owned(), id_token.to_owned()), identity);
    }

    /// Addresses a password reset was sent to, oldest first.
    #[must_use]
    pub fn password_resets(&self) -> Vec<Email> {
        lock(&self.directory.resets).clone()
    }

    /// Sign `uid` out of every connected client, as when the provider
    /// revokes its tokens.
    pub fn revoke(&self, uid: &UserId) {
        let mut sessions = lock(&self.directory.sessions);
        sessions.retain(|weak| weak.strong_count() > 0);
        for session in sessions.iter().filter_map(Weak::upgrade) {
            session.send_if_modified(|current| {
                if current.as_ref().is_some_and(|identity| &identity.uid == uid) {
                    *current = None;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl AuthConnector for MemoryAuth {
    fn connect(&self) -> Arc<dyn AuthProvider> {
        let (sender, _) = watch::channel(None);
        let sender = Arc::new(sender);
        lock(&self.directory.sessions).push(Arc::downgrade(&sender));
        Arc::new(MemoryAuthSession {
            directory: Arc::clone(&self.directory),
            identity: sender,
        })
    }
}

/// One client's session against a [`MemoryAuth`] directory.
pub struct MemoryAuthSession {
    directory: Arc<Directory>,
    identity: Arc<watch::Sender<Option<Identity>>>,
}

impl MemoryAuthSession {
    fn signed_in(&self, identity: Identity) -> Identity {
        debug!(user_id = %identity.uid, "Memory auth sign-in");
        self.identity.send_replace(Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthSession {
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        let identity = {
            let accounts = lock(&self.directory.accounts);
            match accounts.get(&email.normalized()) {
                Some(account)
                    if account.password.expose_secret() == password.expose_secret() =>
                {
                    account.identity.clone()
                }
                _ => return Err(AuthProviderError::InvalidCredentials),
            }
        };
        Ok(self.signed_in(identity))
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        let identity = MemoryAuth {
            directory: Arc::clone(&self.directory),
        }
        .create_account(email, password)?;
        Ok(self.signed_in(identity))
    }

    async fn sign_in_with_provider(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Identity, AuthProviderError> {
        let key = (
            credential.provider_id.clone(),
            credential.id_token.expose_secret().to_owned(),
        );
        let identity = lock(&self.directory.federated)
            .get(&key)
            .cloned()
            .ok_or(AuthProviderError::InvalidCredentials)?;
        Ok(self.signed_in(identity))
    }

    async fn sign_out(&self) -> Result<(), AuthProviderError> {
        self.identity.send_replace(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthProviderError> {
        // Unknown addresses succeed silently so callers can't probe accounts.
        if lock(&self.directory.accounts).contains_key(&email.normalized()) {
            lock(&self.directory.resets).push(email.clone());
        }
        Ok(())
    }
}
