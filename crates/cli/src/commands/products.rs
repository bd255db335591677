//! Catalog inspection.

use std::sync::Arc;

use bazaar_admin::services::{CatalogEditor, EditorError};
use bazaar_backend::Backend;

/// Log every product, by name.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read.
pub async fn list(backend: &Backend) -> Result<(), EditorError> {
    let products = CatalogEditor::new(Arc::clone(&backend.store)).list().await?;

    tracing::info!("{} products", products.len());
    for product in &products {
        tracing::info!(
            "  {}  {:<30} {:>10}  {}",
            product.id,
            product.name,
            product.price.to_string(),
            product.category
        );
    }
    Ok(())
}
