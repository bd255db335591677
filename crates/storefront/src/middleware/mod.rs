//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with in-memory store)
//!
//! The [`Shopper`] and [`SignedIn`] extractors resolve the session to its
//! shopper client.

pub mod session;
pub mod shopper;

pub use session::create_session_layer;
pub use shopper::{SESSION_CLIENT_KEY, Shopper, SignedIn};
