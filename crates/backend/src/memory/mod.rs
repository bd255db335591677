//! In-process backend used by tests, the CLI's dry runs and local demos.
//!
//! Behaves like the hosted service where the storefront depends on it:
//! batches are atomic, subscriptions deliver the full result set on every
//! change and server timestamps come from the store's own clock. It also
//! lets tests inject write failures and latency.

mod auth;
mod store;

pub use auth::{MemoryAuth, MemoryAuthSession};
pub use store::MemoryDocumentStore;
