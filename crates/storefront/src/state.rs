//! Application state shared across handlers.

use std::sync::Arc;

use bazaar_backend::Backend;

use crate::client::ClientRegistry;
use crate::config::StorefrontConfig;
use crate::services::{CatalogAccess, CheckoutCommit, OrderHistory};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend-wide services and the per-shopper client registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogAccess,
    checkout: CheckoutCommit,
    orders: OrderHistory,
    clients: ClientRegistry,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `backend` - Document store and auth connector
    #[must_use]
    pub fn new(config: StorefrontConfig, backend: Backend) -> Self {
        let catalog = CatalogAccess::new(Arc::clone(&backend.store));
        let checkout = CheckoutCommit::new(Arc::clone(&backend.store), config.commit_strategy);
        let orders = OrderHistory::new(Arc::clone(&backend.store));
        let clients = ClientRegistry::new(backend, config.shopper_idle_timeout);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                checkout,
                orders,
                clients,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogAccess {
        &self.inner.catalog
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutCommit {
        &self.inner.checkout
    }

    #[must_use]
    pub fn orders(&self) -> &OrderHistory {
        &self.inner.orders
    }

    /// Per-shopper clients keyed by browser session.
    #[must_use]
    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }
}
