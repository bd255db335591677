//! Bazaar Backend - the hosted-backend seam.
//!
//! All durable state lives in an external service offering authentication
//! and a document database with live queries. This crate defines what the
//! storefront needs from that service and provides two implementations.
//!
//! # Architecture
//!
//! - [`DocumentStore`] - reads, queries, atomic write batches and live
//!   subscriptions over slash-separated document paths
//! - [`AuthConnector`] / [`AuthProvider`] - per-client sign-in state pushed
//!   through a watch channel
//! - [`memory`] - in-process implementation with fault injection for tests
//! - [`firebase`] - Firestore and Identity Toolkit over their REST APIs
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_backend::{Backend, Query, paths};
//!
//! let backend = Backend::memory();
//! let products = backend.store.list(&Query::new(paths::products())).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod document;
pub mod firebase;
pub mod memory;
pub mod path;
pub mod query;
pub mod store;
pub mod write;

pub use auth::{AuthConnector, AuthProvider, AuthProviderError, ProviderCredential};
pub use config::{BackendConfig, ConfigError, FirebaseConfig};
pub use document::{Document, DocumentError, Fields, auto_id, encode};
pub use path::{CollectionPath, DocumentPath, PathError};
pub use query::{Direction, Filter, FilterOp, OrderBy, PREFIX_SENTINEL, Query};
pub use store::{DocumentStore, QuerySnapshot, StoreError, Subscription};
pub use write::{Write, WriteBatch};

/// The storefront's logical document layout.
pub mod paths {
    pub use crate::path::{cart_item, order, product, products, user_cart, user_orders};
}

/// A document store plus an auth connector, as the binaries use them.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthConnector>,
}

impl Backend {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthConnector>) -> Self {
        Self { store, auth }
    }

    /// A fresh, empty in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(
            Arc::new(memory::MemoryDocumentStore::new()),
            Arc::new(memory::MemoryAuth::new()),
        )
    }

    /// Build the backend selected by configuration.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        match config {
            BackendConfig::Memory => {
                tracing::warn!("Using the in-memory backend; data is lost on exit");
                Self::memory()
            }
            BackendConfig::Firebase(firebase) => {
                tracing::info!(project = %firebase.project_id, "Using Firebase backend");
                Self::new(
                    Arc::new(firebase::FirestoreClient::new(firebase)),
                    Arc::new(firebase::FirebaseAuthConnector::new(firebase)),
                )
            }
        }
    }
}
