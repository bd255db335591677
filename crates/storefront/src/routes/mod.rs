//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products?category=&q=   - List, filter by category, prefix search
//! GET    /api/products/featured       - First few products (?limit=4)
//! GET    /api/products/{id}           - Product detail (404 when absent)
//! GET    /api/categories              - Category filter options
//!
//! # Auth
//! POST   /api/auth/login              - Email/password sign-in
//! POST   /api/auth/signup             - Create account
//! POST   /api/auth/provider           - Federated sign-in with an ID token
//! POST   /api/auth/logout             - Sign out
//! POST   /api/auth/password-reset     - Email a reset link
//! GET    /api/auth/me                 - Current identity, if any
//!
//! # Cart (requires auth for mutations)
//! GET    /api/cart                    - Items, subtotal, count, visibility
//! GET    /api/cart/stream             - SSE feed of cart changes
//! POST   /api/cart/items              - Add one unit of a product
//! PATCH  /api/cart/items/{id}         - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{id}         - Remove a line
//! PUT    /api/cart/visibility         - Open or close the cart panel
//!
//! # Checkout (requires auth)
//! GET    /api/checkout                - Current step and order summary
//! POST   /api/checkout/shipping       - Submit shipping details
//! POST   /api/checkout/back           - Return to shipping entry
//! POST   /api/checkout/place-order    - Submit payment and place the order
//!
//! # Account (requires auth)
//! GET    /api/account/orders          - Order history, newest first
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/featured", get(products::featured))
        .route("/products/{id}", get(products::show))
        .route("/categories", get(products::categories))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/provider", post(auth::provider))
        .route("/logout", post(auth::logout))
        .route("/password-reset", post(auth::password_reset))
        .route("/me", get(auth::me))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/stream", get(cart::stream))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
        .route("/visibility", put(cart::set_visibility))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/shipping", post(checkout::shipping))
        .route("/back", post(checkout::back))
        .route("/place-order", post(checkout::place_order))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/orders", get(account::orders))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api", product_routes())
        .nest("/api/auth", auth_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/account", account_routes())
}
