//! HTTP middleware stack for admin.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (in-memory, SameSite=Strict)

pub mod auth;
pub mod session;

pub use auth::RequireAdmin;
pub use session::create_session_layer;
