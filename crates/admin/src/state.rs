//! Application state shared across handlers.

use std::sync::Arc;

use bazaar_backend::{AuthConnector, Backend};

use crate::config::AdminConfig;
use crate::services::CatalogEditor;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    editor: CatalogEditor,
    auth: Arc<dyn AuthConnector>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, backend: Backend) -> Self {
        let editor = CatalogEditor::new(backend.store);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                editor,
                auth: backend.auth,
            }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn editor(&self) -> &CatalogEditor {
        &self.inner.editor
    }

    /// Connector used to verify admin credentials at login.
    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthConnector> {
        &self.inner.auth
    }
}
