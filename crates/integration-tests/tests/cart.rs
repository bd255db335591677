//! Cart store properties, driven through shopper clients.

#![allow(clippy::unwrap_used)]

use bazaar_backend::Write;
use bazaar_core::{Money, ProductId};
use bazaar_integration_tests::{PASSWORD, TestBackend, secret, wait_for_cart};
use bazaar_storefront::client::ShopperClient;
use bazaar_storefront::services::{AuthService, CartError, KeyedLocks};
use std::time::Duration;

const SHOPPER: &str = "shopper@example.com";

fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

// =============================================================================
// Quantities
// =============================================================================

#[tokio::test]
async fn test_three_adds_make_one_line_of_three() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;

    for _ in 0..3 {
        client.cart().add_to_cart(&shirt).await.unwrap();
    }

    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(3));
    wait_for_cart(client.cart(), |items| {
        items.len() == 1 && items.first().is_some_and(|line| line.quantity == 3)
    })
    .await;
}

#[tokio::test]
async fn test_update_to_zero_or_negative_removes_the_line() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let shoes = backend.seed_product("p2", "Shoes", "5.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client.cart().add_to_cart(&shirt).await.unwrap();
    client.cart().add_to_cart(&shoes).await.unwrap();

    client.cart().update_quantity(&shirt.id, 0).await.unwrap();
    client.cart().update_quantity(&shoes.id, -1).await.unwrap();

    assert_eq!(backend.stored_quantity(&identity, "p1").await, None);
    assert_eq!(backend.stored_quantity(&identity, "p2").await, None);
    client.cart().refresh().await.unwrap();
    assert!(client.cart().items().is_empty());
}

#[tokio::test]
async fn test_remove_of_absent_line_is_a_noop() {
    let backend = TestBackend::new();
    backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client.cart().add_to_cart(&shirt).await.unwrap();

    client
        .cart()
        .remove_from_cart(&ProductId::new("never-added"))
        .await
        .unwrap();

    client.cart().refresh().await.unwrap();
    assert_eq!(client.cart().items().len(), 1);
}

#[tokio::test]
async fn test_positive_update_of_absent_line_creates_nothing() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;

    let err = client
        .cart()
        .update_quantity(&ProductId::new("p9"), 4)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::LineNotFound(_)));
    assert_eq!(backend.stored_quantity(&identity, "p9").await, None);
}

// =============================================================================
// Subtotal
// =============================================================================

#[tokio::test]
async fn test_subtotal_is_exact_decimal_arithmetic() {
    let backend = TestBackend::new();
    backend.create_account(SHOPPER);
    let dime = backend.seed_product("dime", "Dime", "0.10", "Coins").await;
    let other = backend.seed_product("twenty", "Twenty", "0.20", "Coins").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;

    for _ in 0..3 {
        client.cart().add_to_cart(&dime).await.unwrap();
    }
    client.cart().add_to_cart(&other).await.unwrap();
    client.cart().refresh().await.unwrap();

    assert_eq!(client.cart().subtotal().unwrap(), money("0.50"));
    assert_eq!(client.cart().item_count(), 4);
}

// =============================================================================
// Several clients, one shopper
// =============================================================================

#[tokio::test]
async fn test_changes_from_another_device_are_mirrored() {
    let backend = TestBackend::new();
    backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let locks = KeyedLocks::new();
    let phone = backend.signed_in_client(SHOPPER, locks.clone()).await;
    let laptop = backend.signed_in_client(SHOPPER, locks).await;

    phone.cart().add_to_cart(&shirt).await.unwrap();

    wait_for_cart(laptop.cart(), |items| items.len() == 1).await;
    assert_eq!(laptop.cart().subtotal().unwrap(), money("10.00"));
}

#[tokio::test]
async fn test_concurrent_adds_from_two_clients_are_not_lost() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let locks = KeyedLocks::new();
    let phone = backend.signed_in_client(SHOPPER, locks.clone()).await;
    let laptop = backend.signed_in_client(SHOPPER, locks).await;
    backend.store.set_write_latency(Some(Duration::from_millis(5)));

    let adds = (0..3)
        .map(|_| phone.cart().add_to_cart(&shirt))
        .chain((0..3).map(|_| laptop.cart().add_to_cart(&shirt)));
    for result in futures::future::join_all(adds).await {
        result.unwrap();
    }

    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(6));
}

// =============================================================================
// Identity changes
// =============================================================================

#[tokio::test]
async fn test_sign_out_empties_view_without_deleting() {
    let backend = TestBackend::new();
    let identity = backend.create_account(SHOPPER);
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client.cart().add_to_cart(&shirt).await.unwrap();
    wait_for_cart(client.cart(), |items| items.len() == 1).await;

    AuthService::new(client.session()).sign_out().await.unwrap();

    assert!(client.cart().items().is_empty());
    assert!(
        !backend
            .store
            .write_log()
            .iter()
            .any(|write| matches!(write, Write::Delete { .. }))
    );
    assert_eq!(backend.stored_quantity(&identity, "p1").await, Some(1));

    // Signing back in brings the stored cart back.
    AuthService::new(client.session())
        .sign_in(SHOPPER, &secret(PASSWORD))
        .await
        .unwrap();
    wait_for_cart(client.cart(), |items| items.len() == 1).await;
}

#[tokio::test]
async fn test_switching_shopper_never_shows_previous_cart() {
    let backend = TestBackend::new();
    backend.create_account(SHOPPER);
    backend.create_account("second@example.com");
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = backend.signed_in_client(SHOPPER, KeyedLocks::new()).await;
    client.cart().add_to_cart(&shirt).await.unwrap();
    wait_for_cart(client.cart(), |items| items.len() == 1).await;

    let auth = AuthService::new(client.session());
    auth.sign_out().await.unwrap();
    auth.sign_in("second@example.com", &secret(PASSWORD))
        .await
        .unwrap();

    assert!(client.cart().items().is_empty());
}

#[tokio::test]
async fn test_signed_out_add_writes_nothing() {
    let backend = TestBackend::new();
    let shirt = backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;
    let client = ShopperClient::new(&backend.backend(), KeyedLocks::new());
    let writes_before = backend.store.write_log().len();

    let err = client.cart().add_to_cart(&shirt).await.unwrap_err();

    assert!(matches!(err, CartError::Unauthenticated));
    assert_eq!(backend.store.write_log().len(), writes_before);
}
