//! Catalog editor: create, update and two-phase delete of products.
//!
//! Every mutation refetches the whole catalog and returns it, so callers
//! never patch a local copy. Deletion is requested first and only carried
//! out when the returned confirmation token comes back.

use std::sync::Arc;
use std::time::Duration;

use bazaar_backend::{
    Direction, DocumentError, DocumentStore, PathError, Query, StoreError, encode, paths,
};
use bazaar_core::{DraftError, Product, ProductDraft, ProductId};
use moka::future::Cache;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

/// How long a delete confirmation stays valid.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Invalid(#[from] DraftError),

    #[error("product {0} not found")]
    NotFound(ProductId),

    /// The token is unknown, expired, or was issued for another product.
    #[error("delete confirmation is missing or expired")]
    ConfirmationRequired,

    #[error("invalid product id: {0}")]
    InvalidId(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A pending delete awaiting confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteConfirmation {
    pub token: Uuid,
    pub product: Product,
}

/// Product CRUD over the shared `products` collection.
#[derive(Clone)]
pub struct CatalogEditor {
    store: Arc<dyn DocumentStore>,
    pending: Cache<Uuid, ProductId>,
}

impl CatalogEditor {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_confirmation_ttl(store, CONFIRMATION_TTL)
    }

    #[must_use]
    pub fn with_confirmation_ttl(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        let pending = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { store, pending }
    }

    /// The whole catalog, by name.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Product>, EditorError> {
        let query = Query::new(paths::products()).order_by("name", Direction::Ascending);
        let docs = self.store.list(&query).await?;
        Ok(docs
            .iter()
            .map(bazaar_backend::Document::decode)
            .collect::<Result<_, _>>()?)
    }

    /// Add a product with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Invalid`] for a blank name or category.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: ProductDraft) -> Result<Vec<Product>, EditorError> {
        let draft = draft.validate()?;
        let path = self.store.add(&paths::products(), encode(&draft)?).await?;
        info!(product_id = %path.id(), "Product created");
        self.list().await
    }

    /// Replace an existing product's fields.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the product does not exist, or
    /// [`EditorError::Invalid`] for a blank name or category.
    #[instrument(skip(self, draft), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: &ProductId,
        draft: ProductDraft,
    ) -> Result<Vec<Product>, EditorError> {
        let draft = draft.validate()?;
        let path = paths::product(id)?;
        match self.store.update(&path, encode(&draft)?).await {
            Ok(()) => info!("Product updated"),
            Err(StoreError::NotFound(_)) => return Err(EditorError::NotFound(id.clone())),
            Err(e) => return Err(e.into()),
        }
        self.list().await
    }

    /// Start a delete. Nothing is removed until [`Self::confirm_delete`] is
    /// called with the returned token.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn request_delete(&self, id: &ProductId) -> Result<DeleteConfirmation, EditorError> {
        let product: Product = self
            .store
            .get(&paths::product(id)?)
            .await?
            .ok_or_else(|| EditorError::NotFound(id.clone()))?
            .decode()?;

        let token = Uuid::new_v4();
        self.pending.insert(token, id.clone()).await;
        Ok(DeleteConfirmation { token, product })
    }

    /// Delete the product a confirmation was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ConfirmationRequired`] unless `token` was
    /// issued for `id` and has not expired or been used.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn confirm_delete(
        &self,
        id: &ProductId,
        token: Uuid,
    ) -> Result<Vec<Product>, EditorError> {
        match self.pending.get(&token).await {
            Some(pending) if &pending == id => self.pending.invalidate(&token).await,
            _ => return Err(EditorError::ConfirmationRequired),
        }

        self.store.delete(&paths::product(id)?).await?;
        info!("Product deleted");
        self.list().await
    }

    /// Abandon a pending delete. Unknown tokens are ignored.
    pub async fn cancel_delete(&self, token: Uuid) {
        self.pending.invalidate(&token).await;
    }
}
