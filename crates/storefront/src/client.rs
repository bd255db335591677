//! Per-shopper clients.
//!
//! Each browser session gets its own auth provider connection, identity
//! session, cart mirror and checkout flow, the way each browser tab of a
//! client-side app would. Clients are cached by session id and dropped after
//! a period of inactivity, which unregisters their subscriptions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bazaar_backend::Backend;
use bazaar_core::Order;
use moka::future::Cache;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::services::{
    CartStore, CheckoutCommit, CheckoutError, CheckoutFlow, IdentitySession, KeyedLocks,
    PaymentDetails,
};

/// Idle time after which a shopper's client is dropped.
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One shopper's live state.
pub struct ShopperClient {
    cart: CartStore,
    session: IdentitySession,
    checkout: Arc<Mutex<CheckoutFlow>>,
}

impl ShopperClient {
    /// Connect to the backend and start mirroring.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(backend: &Backend, locks: KeyedLocks) -> Self {
        let session = IdentitySession::start(backend.auth.connect());
        let cart = CartStore::new(Arc::clone(&backend.store), &session, locks);
        Self {
            cart,
            session,
            checkout: Arc::new(Mutex::new(CheckoutFlow::new())),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &IdentitySession {
        &self.session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Run `f` against the checkout flow.
    pub fn with_checkout<T>(&self, f: impl FnOnce(&mut CheckoutFlow) -> T) -> T {
        with_flow(&self.checkout, f)
    }

    /// Place an order for the current cart.
    ///
    /// The flow is `Processing` while the commit runs, so a second submit
    /// is refused instead of committing twice. The commit runs on its own
    /// task and records its outcome in the flow even if the caller stops
    /// waiting.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Unauthenticated`] while signed out
    /// - [`CheckoutError::EmptyCart`] if there is nothing to order
    /// - [`CheckoutError::Flow`] if payment is not the current step or a
    ///   payment field is blank
    /// - any error from [`CheckoutCommit::commit`]
    #[instrument(skip_all)]
    pub async fn place_order(
        &self,
        commit: &CheckoutCommit,
        payment: &PaymentDetails,
    ) -> Result<Order, CheckoutError> {
        let identity = self
            .session
            .require()
            .map_err(|_| CheckoutError::Unauthenticated)?;
        let items = self.cart.items();
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping = self.with_checkout(|flow| flow.begin_payment(payment))?;

        let flow = Arc::clone(&self.checkout);
        let commit = commit.clone();
        let task = tokio::spawn(async move {
            let result = commit.commit(&identity, &items, shipping).await;
            with_flow(&flow, |flow| flow.finish(&result));
            result
        });
        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Checkout task did not complete");
                let result = Err(CheckoutError::Interrupted);
                self.with_checkout(|flow| flow.finish(&result));
                result
            }
        };

        if result.is_ok() {
            // The commit already removed the lines; don't wait for the
            // subscription to say so.
            if let Err(e) = self.cart.refresh().await {
                warn!(error = %e, "Cart refresh failed after order, serving mirrored cart");
            }
        }
        result
    }

    /// Forget any checkout in progress, e.g. on sign-out.
    pub fn reset_checkout(&self) {
        self.with_checkout(CheckoutFlow::reset);
    }
}

fn with_flow<T>(flow: &Mutex<CheckoutFlow>, f: impl FnOnce(&mut CheckoutFlow) -> T) -> T {
    let mut flow = flow.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut flow)
}

/// Shopper clients keyed by browser session.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Cache<Uuid, Arc<ShopperClient>>,
    backend: Backend,
    locks: KeyedLocks,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(backend: Backend, idle_timeout: Duration) -> Self {
        let clients = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(idle_timeout)
            .build();
        Self {
            clients,
            backend,
            locks: KeyedLocks::new(),
        }
    }

    /// The client for `id`, connecting a new one on first use.
    pub async fn get_or_connect(&self, id: Uuid) -> Arc<ShopperClient> {
        self.clients
            .get_with(id, async {
                debug!(client_id = %id, "Connecting shopper client");
                Arc::new(ShopperClient::new(&self.backend, self.locks.clone()))
            })
            .await
    }

    /// Drop the client for `id`.
    pub async fn disconnect(&self, id: Uuid) {
        self.clients.invalidate(&id).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_backend::memory::{MemoryAuth, MemoryDocumentStore};
    use bazaar_backend::{DocumentStore, encode, paths};
    use bazaar_core::{Email, Product, ProductId, ShippingInfo};
    use secrecy::SecretString;

    use crate::services::{AuthService, CheckoutStep, CommitStrategy};

    fn secret(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    fn product(id: &str, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            price: price.parse().unwrap(),
            category: "Apparel".to_string(),
            description: String::new(),
            image_url: String::new(),
        }
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "A".to_string(),
            address: "B".to_string(),
            city: "C".to_string(),
            zip_code: "D".to_string(),
        }
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            card_number: secret("4242"),
            expiry: "12/30".to_string(),
            cvc: secret("123"),
        }
    }

    async fn signed_in_registry() -> (ClientRegistry, MemoryDocumentStore, Uuid) {
        let store = MemoryDocumentStore::new();
        let auth = MemoryAuth::new();
        auth.create_account(&Email::parse("a@b.c").unwrap(), &secret("secret1"))
            .unwrap();
        let backend = Backend::new(Arc::new(store.clone()), Arc::new(auth));
        let registry = ClientRegistry::new(backend, CLIENT_IDLE_TIMEOUT);

        let id = Uuid::new_v4();
        let client = registry.get_or_connect(id).await;
        AuthService::new(client.session())
            .sign_in("a@b.c", &secret("secret1"))
            .await
            .unwrap();
        (registry, store, id)
    }

    #[tokio::test]
    async fn test_same_id_same_client() {
        let (registry, _, id) = signed_in_registry().await;
        let a = registry.get_or_connect(id).await;
        let b = registry.get_or_connect(id).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.session().current().is_some());

        let other = registry.get_or_connect(Uuid::new_v4()).await;
        assert!(other.session().current().is_none());
    }

    #[tokio::test]
    async fn test_place_order_clears_cart() {
        let (registry, store, id) = signed_in_registry().await;
        let client = registry.get_or_connect(id).await;
        client.cart().add_to_cart(&product("p1", "10.00")).await.unwrap();
        client.cart().add_to_cart(&product("p1", "10.00")).await.unwrap();
        client.cart().add_to_cart(&product("p2", "5.00")).await.unwrap();
        client.cart().refresh().await.unwrap();

        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();
        let commit = CheckoutCommit::new(Arc::new(store.clone()), CommitStrategy::SingleBatch);
        let order = client.place_order(&commit, &payment()).await.unwrap();

        assert_eq!(order.subtotal, "25.00".parse().unwrap());
        assert_eq!(order.items.len(), 2);
        assert!(client.cart().items().is_empty());
        assert!(matches!(
            client.with_checkout(|flow| flow.step().clone()),
            CheckoutStep::Succeeded { .. }
        ));

        let uid = client.session().current().unwrap().uid;
        for line in ["p1", "p2"] {
            let path = paths::cart_item(&uid, &ProductId::new(line)).unwrap();
            assert!(store.get(&path).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_place_order_with_empty_cart_is_refused() {
        let (registry, store, id) = signed_in_registry().await;
        let client = registry.get_or_connect(id).await;
        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();
        let commit = CheckoutCommit::new(Arc::new(store.clone()), CommitStrategy::SingleBatch);
        let err = client.place_order(&commit, &payment()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(!client.with_checkout(|flow| flow.is_processing()));
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_place_order_still_finishes() {
        let (registry, store, id) = signed_in_registry().await;
        let client = registry.get_or_connect(id).await;
        client.cart().add_to_cart(&product("p1", "4.00")).await.unwrap();
        client.cart().refresh().await.unwrap();
        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();

        store.set_write_latency(Some(Duration::from_millis(200)));
        let commit = CheckoutCommit::new(Arc::new(store.clone()), CommitStrategy::SingleBatch);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), client.place_order(&commit, &payment()))
                .await;
        assert!(abandoned.is_err());
        assert!(client.with_checkout(|flow| flow.is_processing()));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let step = client.with_checkout(|flow| flow.step().clone());
        assert!(matches!(step, CheckoutStep::Succeeded { .. }), "{step:?}");
        assert!(client.with_checkout(|flow| flow.should_redirect_home(true)));

        let uid = client.session().current().unwrap().uid;
        let orders = store
            .list(&bazaar_backend::Query::new(paths::user_orders(&uid).unwrap()))
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert!(client.cart().items().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_failed_order_can_be_retried() {
        let (registry, store, id) = signed_in_registry().await;
        let client = registry.get_or_connect(id).await;
        client.cart().add_to_cart(&product("p1", "4.00")).await.unwrap();
        client.cart().refresh().await.unwrap();
        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();

        store.set_write_latency(Some(Duration::from_millis(100)));
        store.fail_writes(0, 1);
        let commit = CheckoutCommit::new(Arc::new(store.clone()), CommitStrategy::SingleBatch);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), client.place_order(&commit, &payment()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(matches!(
            client.with_checkout(|flow| flow.step().clone()),
            CheckoutStep::Failed { .. }
        ));
        assert_eq!(client.cart().items().len(), 1);

        store.set_write_latency(None);
        client.with_checkout(CheckoutFlow::back).unwrap();
        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();
        let order = client.place_order(&commit, &payment()).await.unwrap();
        assert_eq!(order.subtotal, "4.00".parse().unwrap());
    }

    #[tokio::test]
    async fn test_failed_order_keeps_cart_and_allows_retry() {
        let (registry, store, id) = signed_in_registry().await;
        let client = registry.get_or_connect(id).await;
        let uid = client.session().current().unwrap().uid;
        let line = bazaar_core::CartLineItem::from_product(&product("p1", "3.00"), 2);
        store
            .set(
                &paths::cart_item(&uid, &line.id).unwrap(),
                encode(&line).unwrap(),
                false,
            )
            .await
            .unwrap();
        client.cart().refresh().await.unwrap();
        client
            .with_checkout(|flow| flow.submit_shipping(shipping()))
            .unwrap();

        store.fail_writes(0, 1);
        let commit = CheckoutCommit::new(Arc::new(store.clone()), CommitStrategy::SingleBatch);
        assert!(client.place_order(&commit, &payment()).await.is_err());
        assert!(matches!(
            client.with_checkout(|flow| flow.step().clone()),
            CheckoutStep::Failed { .. }
        ));
        assert_eq!(client.cart().items().len(), 1);

        let order = client.place_order(&commit, &payment()).await.unwrap();
        assert_eq!(order.subtotal, "6.00".parse().unwrap());
    }
}
