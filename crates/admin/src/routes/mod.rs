//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! POST   /auth/login                       - Email/password login (admin only)
//! POST   /auth/logout                      - End the session
//! GET    /api/products                     - Full catalog
//! POST   /api/products                     - Create a product
//! PUT    /api/products/{id}                - Update a product
//! POST   /api/products/{id}/delete-request - Start a delete, returns a token
//! DELETE /api/products/{id}?token=         - Confirm a delete
//! DELETE /api/delete-requests/{token}      - Cancel a pending delete
//! ```

pub mod auth;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Authentication routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Catalog routes. Every handler requires the administrator.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", put(products::update).delete(products::confirm_delete))
        .route("/products/{id}/delete-request", post(products::request_delete))
        .route("/delete-requests/{token}", delete(products::cancel_delete))
}

/// Build the complete router for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/api", product_routes())
}
