//! Read-only access to the shared `products` collection.

use std::sync::Arc;

use bazaar_backend::{Document, DocumentError, DocumentStore, PathError, Query, StoreError, paths};
use bazaar_core::{Product, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Categories offered by the storefront's filter, in display order.
pub const CATEGORIES: [&str; 4] = ["Apparel", "Electronics", "Stationery", "Home Goods"];

/// Label of the catch-all category option.
pub const ALL_CATEGORIES: &str = "All";

/// Number of products on the home page.
pub const FEATURED_LIMIT: usize = 4;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("invalid product id: {0}")]
    InvalidId(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Category selection: everything, or one named category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl From<String> for CategoryFilter {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Named(trimmed.to_owned())
        }
    }
}

impl From<CategoryFilter> for String {
    fn from(filter: CategoryFilter) -> Self {
        match filter {
            CategoryFilter::All => ALL_CATEGORIES.to_owned(),
            CategoryFilter::Named(name) => name,
        }
    }
}

/// Category filter AND name prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category: CategoryFilter,
    /// Case-sensitive name prefix; blank means no search.
    #[serde(default, rename = "q")]
    pub term: Option<String>,
}

/// Catalog queries.
#[derive(Clone)]
pub struct CatalogAccess {
    store: Arc<dyn DocumentStore>,
}

fn decode_all(docs: &[Document]) -> Result<Vec<Product>, CatalogError> {
    docs.iter()
        .map(|doc| doc.decode().map_err(CatalogError::from))
        .collect()
}

impl CatalogAccess {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn run(&self, query: Query) -> Result<Vec<Product>, CatalogError> {
        let docs = self.store.list(&query).await?;
        decode_all(&docs)
    }

    /// Every product.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Product>, CatalogError> {
        self.run(Query::new(paths::products())).await
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_by_id(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let path = paths::product(id)?;
        match self.store.get(&path).await? {
            Some(doc) => Ok(doc.decode()?),
            None => Err(CatalogError::NotFound(id.clone())),
        }
    }

    /// Products whose category equals `category` exactly.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    #[instrument(skip(self))]
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        self.run(Query::new(paths::products()).where_eq("category", category))
            .await
    }

    /// The first `limit` products.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    #[instrument(skip(self))]
    pub async fn list_featured(&self, limit: usize) -> Result<Vec<Product>, CatalogError> {
        self.run(Query::new(paths::products()).limit(limit)).await
    }

    /// Products matching the category filter and name prefix.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    #[instrument(skip(self))]
    pub async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        let mut query = Query::new(paths::products());
        if let CategoryFilter::Named(category) = &filter.category {
            query = query.where_eq("category", category.as_str());
        }
        if let Some(term) = filter.term.as_deref().filter(|t| !t.is_empty()) {
            query = query.prefix("name", term);
        }
        self.run(query).await
    }
}
