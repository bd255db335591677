//! Storefront and admin routers over one shared backend.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use bazaar_admin::config::AdminConfig;
use bazaar_core::{Email, UserId};
use bazaar_integration_tests::{PASSWORD, TestBackend, request, secret, send};
use bazaar_storefront::config::StorefrontConfig;
use serde_json::json;

const ADMIN_UID: &str = "admin-uid";

struct Apps {
    backend: TestBackend,
    storefront: axum::Router,
    admin: axum::Router,
}

fn apps() -> Apps {
    let backend = TestBackend::new();
    backend
        .auth
        .create_account_with_uid(
            UserId::new(ADMIN_UID),
            &Email::parse("admin@example.com").unwrap(),
            &secret(PASSWORD),
        )
        .unwrap();
    backend.create_account("shopper@example.com");

    let storefront = bazaar_storefront::app(bazaar_storefront::state::AppState::new(
        StorefrontConfig::local(),
        backend.backend(),
    ));
    let admin = bazaar_admin::app(bazaar_admin::state::AppState::new(
        AdminConfig::local(UserId::new(ADMIN_UID)),
        backend.backend(),
    ));
    Apps {
        backend,
        storefront,
        admin,
    }
}

async fn login(router: &axum::Router, uri: &str, email: &str) -> (StatusCode, Option<String>) {
    let (status, cookie, _) = send(
        router,
        request(
            "POST",
            uri,
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await;
    (status, cookie)
}

#[tokio::test]
async fn test_admin_product_is_sold_in_storefront() {
    let apps = apps();
    let (status, admin) = login(&apps.admin, "/auth/login", "admin@example.com").await;
    assert_eq!(status, StatusCode::OK);
    let admin = admin.unwrap();

    let (status, _, products) = send(
        &apps.admin,
        request(
            "POST",
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Lamp", "price": 19.99, "category": "Home Goods" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = products[0]["id"].as_str().unwrap().to_string();

    let (status, _, found) = send(&apps.storefront, request("GET", "/api/products?q=La", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["name"], "Lamp");

    // The storefront session cookie is set on first contact.
    let (_, shopper, _) = send(&apps.storefront, request("GET", "/api/auth/me", None, None)).await;
    let shopper = shopper.unwrap();
    let (status, _, _) = send(
        &apps.storefront,
        request(
            "POST",
            "/api/auth/login",
            Some(&shopper),
            Some(json!({ "email": "shopper@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &apps.storefront,
        request("POST", "/api/cart/items", Some(&shopper), Some(json!({ "productId": id }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Deleting the product leaves the shopper's embedded snapshot alone.
    let (_, _, confirmation) = send(
        &apps.admin,
        request("POST", &format!("/api/products/{id}/delete-request"), Some(&admin), None),
    )
    .await;
    let token = confirmation["token"].as_str().unwrap().to_string();
    let (status, _, remaining) = send(
        &apps.admin,
        request("DELETE", &format!("/api/products/{id}?token={token}"), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(remaining, json!([]));

    let (_, _, cart) = send(&apps.storefront, request("GET", "/api/cart", Some(&shopper), None)).await;
    assert_eq!(cart["items"][0]["name"], "Lamp");
    assert_eq!(cart["subtotal"].as_f64(), Some(19.99));

    let (status, _, _) = send(
        &apps.storefront,
        request("GET", &format!("/api/products/{id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shopper_cannot_use_admin() {
    let apps = apps();
    let (status, cookie) = login(&apps.admin, "/auth/login", "shopper@example.com").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(cookie.is_none());

    let (status, _, _) = send(
        &apps.admin,
        request(
            "POST",
            "/api/products",
            None,
            Some(json!({ "name": "Lamp", "price": 1, "category": "Home Goods" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(apps.backend.store.document_count(), 0);
}

#[tokio::test]
async fn test_cart_sessions_are_isolated() {
    let apps = apps();
    apps.backend.seed_product("p1", "Shirt", "10.00", "Apparel").await;

    let (_, first, _) = send(&apps.storefront, request("GET", "/api/auth/me", None, None)).await;
    let first = first.unwrap();
    send(
        &apps.storefront,
        request(
            "POST",
            "/api/auth/login",
            Some(&first),
            Some(json!({ "email": "shopper@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    send(
        &apps.storefront,
        request("POST", "/api/cart/items", Some(&first), Some(json!({ "productId": "p1" }))),
    )
    .await;

    // A different browser is its own signed-out client.
    let (status, _, _) = send(
        &apps.storefront,
        request("POST", "/api/cart/items", None, Some(json!({ "productId": "p1" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, _, cart) = send(&apps.storefront, request("GET", "/api/cart", Some(&first), None)).await;
    assert_eq!(cart["itemCount"], 1);
}
