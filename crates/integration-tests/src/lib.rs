//! Integration tests for Bazaar.
//!
//! Every test runs against the in-memory backend, so nothing needs to be
//! started first:
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart` - Cart store properties across clients and identity changes
//! - `catalog` - Category filter and prefix search
//! - `checkout` - Order commit, failure handling and the step machine
//! - `http` - Storefront and admin routers sharing one backend
//!
//! This crate holds the shared fixtures.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::Router;
use bazaar_backend::memory::{MemoryAuth, MemoryDocumentStore};
use bazaar_backend::{Backend, DocumentStore, encode, paths};
use bazaar_core::{CartLineItem, Email, Identity, Product, ProductDraft, ProductId, ShippingInfo};
use bazaar_storefront::client::ShopperClient;
use bazaar_storefront::services::{AuthService, CartStore, KeyedLocks, PaymentDetails};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Password given to every account the fixtures create.
pub const PASSWORD: &str = "hunter22";

/// A shared in-memory store and account directory.
#[derive(Clone, Default)]
pub struct TestBackend {
    pub store: MemoryDocumentStore,
    pub auth: MemoryAuth,
}

impl TestBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object view for the services and routers.
    #[must_use]
    pub fn backend(&self) -> Backend {
        Backend::new(Arc::new(self.store.clone()), Arc::new(self.auth.clone()))
    }

    /// Write a product straight into the catalog.
    pub async fn seed_product(&self, id: &str, name: &str, price: &str, category: &str) -> Product {
        let product = ProductDraft {
            name: name.to_string(),
            price: price.parse().unwrap(),
            category: category.to_string(),
            description: String::new(),
            image_url: String::new(),
        }
        .into_product(ProductId::new(id));
        self.store
            .set(&paths::product(&product.id).unwrap(), encode(&product).unwrap(), false)
            .await
            .unwrap();
        product
    }

    /// Create an email/password account.
    #[must_use]
    pub fn create_account(&self, email: &str) -> Identity {
        self.auth
            .create_account(&Email::parse(email).unwrap(), &secret(PASSWORD))
            .unwrap()
    }

    /// A fresh client signed in as `email`. The account must exist.
    pub async fn signed_in_client(&self, email: &str, locks: KeyedLocks) -> ShopperClient {
        let client = ShopperClient::new(&self.backend(), locks);
        AuthService::new(client.session())
            .sign_in(email, &secret(PASSWORD))
            .await
            .unwrap();
        client
    }

    /// Number of orders stored for `identity`.
    pub async fn order_count(&self, identity: &Identity) -> usize {
        let query = bazaar_backend::Query::new(paths::user_orders(&identity.uid).unwrap());
        self.store.list(&query).await.unwrap().len()
    }

    /// The stored quantity of one cart line, if present.
    pub async fn stored_quantity(&self, identity: &Identity, product_id: &str) -> Option<u64> {
        let path = paths::cart_item(&identity.uid, &ProductId::new(product_id)).unwrap();
        self.store
            .get(&path)
            .await
            .unwrap()
            .and_then(|doc| doc.get("quantity").and_then(Value::as_u64))
    }
}

#[must_use]
pub fn secret(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

#[must_use]
pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        name: "Ada Lovelace".to_string(),
        address: "12 Analytical Row".to_string(),
        city: "London".to_string(),
        zip_code: "N1 9GU".to_string(),
    }
}

#[must_use]
pub fn payment() -> PaymentDetails {
    PaymentDetails {
        card_number: secret("4242424242424242"),
        expiry: "12/30".to_string(),
        cvc: secret("123"),
    }
}

/// Wait (up to two seconds) until the cart mirror satisfies `check`.
pub async fn wait_for_cart(cart: &CartStore, check: impl Fn(&[CartLineItem]) -> bool) {
    let mut watch = cart.watch();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check(&cart.items()) {
            watch.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
}

/// Build a JSON request, optionally with a session cookie.
#[must_use]
pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request; returns the status, any `Set-Cookie` pair and the JSON
/// body (`Null` when the body is empty or not JSON).
pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, json)
}
