//! Checkout commit and the checkout step machine, end to end.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{Money, OrderStatus};
use bazaar_integration_tests::{TestBackend, payment, shipping};
use bazaar_storefront::client::ShopperClient;
use bazaar_storefront::services::{
    CheckoutCommit, CheckoutError, CheckoutStep, CommitStrategy, KeyedLocks, OrderHistory,
};

const SHOPPER: &str = "shopper@example.com";

fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

/// A signed-in client holding Shirt x2 and Shoes x1, at the payment step.
async fn ready_to_pay(backend: &TestBackend) -> ShopperClient {
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let shoes = backend.seed_product("p2", "Shoes", "5.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client.cart().add_to_cart(&shirt).await.unwrap();
    client.cart().add_to_cart(&shirt).await.unwrap();
    client.cart().add_to_cart(&shoes).await.unwrap();
    client.cart().refresh().await.unwrap();
    client
        .with_checkout(|flow| flow.submit_shipping(shipping()))
        .unwrap();
    client
}

fn commit(backend: &TestBackend, strategy: CommitStrategy) -> CheckoutCommit {
    CheckoutCommit::new(Arc::new(backend.store.clone()), strategy)
}

#[tokio::test]
async fn test_order_captures_cart_and_clears_it() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;

    let order = client
        .place_order(&commit(&backend, CommitStrategy::SingleBatch), &payment())
        .await
        .unwrap();

    assert_eq!(order.subtotal, money("25.00"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.user_id, identity.uid);
    assert_eq!(order.shipping_info, shipping());
    assert!(order.created_at.is_some());
    assert!(client.cart().items().is_empty());
    assert_eq!(backend.stored_quantity(&identity, "p1").await, None);
    assert_eq!(backend.stored_quantity(&identity, "p2").await, None);

    let history = OrderHistory::new(Arc::new(backend.store.clone()));
    let orders = history.list(&identity.uid).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.id);
}

#[tokio::test]
async fn test_failed_batch_changes_nothing() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;
    backend.store.fail_writes(0, 1);

    let err = client
        .place_order(&commit(&backend, CommitStrategy::SingleBatch), &payment())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::RemoteWrite(_)));
    assert_eq!(backend.order_count(&identity).await, 0);
    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(2));
    assert_eq!(backend.stored_quantity(&identity, "p2").await, Some(1));
    assert_eq!(client.cart().items().len(), 2);
    assert!(!client.with_checkout(|flow| flow.is_processing()));
}

#[tokio::test]
async fn test_order_then_clear_rolls_back_the_order() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;
    // Order write succeeds, cart clear fails, compensation succeeds.
    backend.store.fail_writes(1, 1);

    let err = client
        .place_order(&commit(&backend, CommitStrategy::OrderThenClear), &payment())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::RemoteWrite(_)));
    assert_eq!(backend.order_count(&identity).await, 0);
    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(2));
}

#[tokio::test]
async fn test_order_then_clear_reports_partial_commit() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;
    // Cart clear and the compensating delete both fail.
    backend.store.fail_writes(1, 2);

    let err = client
        .place_order(&commit(&backend, CommitStrategy::OrderThenClear), &payment())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PartialCommit { .. }));
    assert_eq!(backend.order_count(&identity).await, 1);
    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(2));
}

#[tokio::test]
async fn test_retry_after_failure_succeeds_once() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;
    let commit = commit(&backend, CommitStrategy::SingleBatch);
    backend.store.fail_writes(0, 1);

    assert!(client.place_order(&commit, &payment()).await.is_err());
    assert!(matches!(
        client.with_checkout(|flow| flow.step().clone()),
        CheckoutStep::Failed { .. }
    ));

    let order = client.place_order(&commit, &payment()).await.unwrap();
    assert_eq!(order.subtotal, money("25.00"));
    assert_eq!(backend.order_count(&identity).await, 1);
}

#[tokio::test]
async fn test_empty_cart_is_never_committed() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client
        .with_checkout(|flow| flow.submit_shipping(shipping()))
        .unwrap();
    let writes_before = backend.store.write_log().len();

    let err = client
        .place_order(&commit(&backend, CommitStrategy::SingleBatch), &payment())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(backend.store.write_log().len(), writes_before);
    assert_eq!(backend.order_count(&identity).await, 0);
    assert!(client.with_checkout(|flow| flow.should_redirect_home(true)));
}

#[tokio::test]
async fn test_double_submit_places_one_order() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = ready_to_pay(&backend).await;
    backend.store.set_write_latency(Some(Duration::from_millis(20)));
    let commit = commit(&backend, CommitStrategy::SingleBatch);

    let (payment_a, payment_b) = (payment(), payment());
    let (first, second) = tokio::join!(
        client.place_order(&commit, &payment_a),
        client.place_order(&commit, &payment_b),
    );

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    assert_eq!(backend.order_count(&identity).await, 1);
}

#[tokio::test]
async fn test_signed_out_checkout_is_refused() {
    let backend = TestBackend::new();
    backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = ShopperClient::new(&backend.backend(), KeyedLocks::new());

    let err = client
        .place_order(&commit(&backend, CommitStrategy::SingleBatch), &payment())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Unauthenticated));
    assert_eq!(backend.store.write_log().len(), 1);
}
