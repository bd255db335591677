//! Identity session: the storefront's mirror of the auth provider's state.
//!
//! The provider pushes identity changes; the session copies each one
//! wholesale into its own watch channel, which the cart and checkout read.
//! The forwarding task lives exactly as long as the session.

use std::sync::{Arc, Mutex, PoisonError};

use bazaar_backend::AuthProvider;
use bazaar_core::Identity;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// An operation needed a signed-in shopper and there was none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not signed in")]
pub struct Unauthenticated;

/// Tracks the current identity for one client.
pub struct IdentitySession {
    provider: Arc<dyn AuthProvider>,
    upstream: watch::Receiver<Option<Identity>>,
    identity: Arc<watch::Sender<Option<Identity>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IdentitySession {
    /// Subscribe to the provider and start mirroring its pushes.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(provider: Arc<dyn AuthProvider>) -> Self {
        let mut upstream = provider.watch_identity();
        let initial = upstream.borrow_and_update().clone();
        let identity = Arc::new(watch::channel(initial).0);

        let mut feed = upstream.clone();
        let mirror = Arc::clone(&identity);
        let task = tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let next = feed.borrow_and_update().clone();
                debug!(user_id = ?next.as_ref().map(|i| i.uid.as_str()), "Identity changed");
                mirror.send_replace(next);
            }
        });

        Self {
            provider,
            upstream,
            identity,
            task: Mutex::new(Some(task)),
        }
    }

    /// The auth provider this session listens to.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    /// The identity right now; `None` while signed out.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// The current identity, or [`Unauthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Unauthenticated`] while signed out.
    pub fn require(&self) -> Result<Identity, Unauthenticated> {
        self.current().ok_or(Unauthenticated)
    }

    /// Receive every identity change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Pull the provider's latest identity into the mirror now.
    ///
    /// Used right after this client signed in or out, so the caller reads its
    /// own change without waiting for the forwarding task.
    pub fn sync(&self) {
        if self.is_shut_down() {
            return;
        }
        let latest = self.upstream.borrow().clone();
        self.identity.send_if_modified(|current| {
            if *current == latest {
                false
            } else {
                *current = latest;
                true
            }
        });
    }

    /// Stop listening to the provider and report signed-out from now on.
    pub fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            self.identity.send_replace(None);
        }
    }

    fn is_shut_down(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for IdentitySession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_backend::AuthConnector;
    use bazaar_backend::memory::MemoryAuth;
    use bazaar_core::Email;
    use secrecy::SecretString;

    fn password() -> SecretString {
        SecretString::from("hunter22".to_string())
    }

    #[tokio::test]
    async fn test_starts_signed_out() {
        let session = IdentitySession::start(MemoryAuth::new().connect());
        assert!(session.current().is_none());
        assert_eq!(session.require(), Err(Unauthenticated));
    }

    #[tokio::test]
    async fn test_mirrors_provider_pushes() {
        let auth = MemoryAuth::new();
        let email = Email::parse("a@b.c").unwrap();
        let identity = auth.create_account(&email, &password()).unwrap();
        let provider = auth.connect();
        let session = IdentitySession::start(Arc::clone(&provider));
        let mut watch = session.watch();

        provider.sign_in(&email, &password()).await.unwrap();
        watch.changed().await.unwrap();
        assert_eq!(session.current(), Some(identity.clone()));

        // A push the client did not initiate.
        auth.revoke(&identity.uid);
        watch.changed().await.unwrap();
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_sync_is_immediate() {
        let auth = MemoryAuth::new();
        let email = Email::parse("a@b.c").unwrap();
        auth.create_account(&email, &password()).unwrap();
        let session = IdentitySession::start(auth.connect());

        session.provider().sign_in(&email, &password()).await.unwrap();
        session.sync();
        assert!(session.require().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_stops_mirroring() {
        let auth = MemoryAuth::new();
        let email = Email::parse("a@b.c").unwrap();
        auth.create_account(&email, &password()).unwrap();
        let session = IdentitySession::start(auth.connect());

        session.shutdown();
        session.provider().sign_in(&email, &password()).await.unwrap();
        session.sync();
        tokio::task::yield_now().await;
        assert!(session.current().is_none());
    }
}
