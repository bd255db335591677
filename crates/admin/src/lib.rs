//! Bazaar Admin library.
//!
//! The catalog editor and its admin-only HTTP API, as a library so the
//! router can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the admin application. Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use bazaar_backend::Backend;
    use bazaar_backend::memory::{MemoryAuth, MemoryDocumentStore};
    use bazaar_core::{Email, UserId};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::AdminConfig;

    struct TestApp {
        router: Router,
        store: MemoryDocumentStore,
    }

    fn test_app() -> TestApp {
        let store = MemoryDocumentStore::new();
        let auth = MemoryAuth::new();
        let password = SecretString::from("admin-pass".to_string());
        auth.create_account_with_uid(
            UserId::new("admin-uid"),
            &Email::parse("admin@example.com").unwrap(),
            &password,
        )
        .unwrap();
        auth.create_account(&Email::parse("shopper@example.com").unwrap(), &password)
            .unwrap();

        let backend = Backend::new(Arc::new(store.clone()), Arc::new(auth));
        let state = AppState::new(AdminConfig::local(UserId::new("admin-uid")), backend);
        TestApp {
            router: app(state),
            store,
        }
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
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

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = app.router.clone().oneshot(req).await.unwrap();
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

    async fn login(app: &TestApp, email: &str) -> (StatusCode, Option<String>) {
        let (status, cookie, _) = send(
            app,
            request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": "admin-pass" })),
            ),
        )
        .await;
        (status, cookie)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, _, _) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_products_require_login() {
        let app = test_app();
        let (status, _, body) = send(&app, request("GET", "/api/products", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_non_admin_login_is_forbidden() {
        let app = test_app();
        let (status, cookie) = login(&app, "shopper@example.com").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(cookie.is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = test_app();
        let (status, _, _) = send(
            &app,
            request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "admin@example.com", "password": "nope-nope" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_crud_with_confirmed_delete() {
        let app = test_app();
        let (status, cookie) = login(&app, "admin@example.com").await;
        assert_eq!(status, StatusCode::OK);
        let cookie = cookie.unwrap();

        let (status, _, body) = send(
            &app,
            request(
                "POST",
                "/api/products",
                Some(&cookie),
                Some(json!({ "name": "Hat", "price": 12.5, "category": "Apparel" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body[0]["id"].as_str().unwrap().to_string();

        let (status, _, _) = send(
            &app,
            request(
                "POST",
                "/api/products",
                Some(&cookie),
                Some(json!({ "name": "", "price": 1, "category": "Apparel" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(
            &app,
            request(
                "PUT",
                &format!("/api/products/{id}"),
                Some(&cookie),
                Some(json!({ "name": "Cap", "price": 10, "category": "Apparel" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Cap");

        // Delete without a token never reaches the store.
        let (status, _, _) = send(
            &app,
            request("DELETE", &format!("/api/products/{id}"), Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.store.document_count(), 1);

        let (status, _, body) = send(
            &app,
            request(
                "POST",
                &format!("/api/products/{id}/delete-request"),
                Some(&cookie),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["product"]["name"], "Cap");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _, body) = send(
            &app,
            request(
                "DELETE",
                &format!("/api/products/{id}?token={token}"),
                Some(&cookie),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(app.store.document_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = test_app();
        let (_, cookie) = login(&app, "admin@example.com").await;
        let cookie = cookie.unwrap();

        let (status, _, _) = send(&app, request("POST", "/auth/logout", Some(&cookie), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, _) = send(&app, request("GET", "/api/products", Some(&cookie), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
