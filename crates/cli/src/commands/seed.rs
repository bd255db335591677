//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Shirt
//!     price: 10.00
//!     category: Apparel
//!     description: Plain cotton tee
//!     imageUrl: https://cdn.example.com/shirt.png
//! ```
//!
//! Every draft is validated before anything is written, so a bad entry
//! leaves the catalog untouched.

use std::path::Path;
use std::sync::Arc;

use bazaar_admin::services::{CatalogEditor, EditorError};
use bazaar_backend::Backend;
use bazaar_core::{DraftError, ProductDraft};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{} invalid products", .0.len())]
    Invalid(Vec<(usize, DraftError)>),

    #[error(transparent)]
    Editor(#[from] EditorError),
}

/// Top-level shape of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<ProductDraft>,
}

/// Validate every draft, collecting failures by position.
///
/// # Errors
///
/// Returns [`SeedError::Invalid`] listing each failing entry.
pub fn validate(drafts: Vec<ProductDraft>) -> Result<Vec<ProductDraft>, SeedError> {
    let mut valid = Vec::with_capacity(drafts.len());
    let mut errors = Vec::new();
    for (index, draft) in drafts.into_iter().enumerate() {
        match draft.validate() {
            Ok(draft) => valid.push(draft),
            Err(e) => errors.push((index, e)),
        }
    }
    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(SeedError::Invalid(errors))
    }
}

/// Create every draft through the editor. Returns how many were written.
///
/// # Errors
///
/// Returns an error on the first failed write; earlier products stay.
pub async fn create_all(
    editor: &CatalogEditor,
    drafts: Vec<ProductDraft>,
) -> Result<usize, SeedError> {
    let mut created = 0;
    for draft in drafts {
        let name = draft.name.clone();
        editor.create(draft).await?;
        created += 1;
        info!("  created {name}");
    }
    Ok(created)
}

/// Seed products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, any draft is
/// invalid, or a write fails.
pub async fn products(backend: &Backend, file_path: &str, dry_run: bool) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let drafts = match validate(seed.products) {
        Ok(drafts) => drafts,
        Err(SeedError::Invalid(errors)) => {
            error!("Validation failed:");
            for (index, err) in &errors {
                error!("  - product #{}: {err}", index + 1);
            }
            return Err(SeedError::Invalid(errors));
        }
        Err(e) => return Err(e),
    };

    if dry_run {
        info!("Dry run: {} products valid, nothing written", drafts.len());
        return Ok(());
    }

    let editor = CatalogEditor::new(Arc::clone(&backend.store));
    let created = create_all(&editor, drafts).await?;
    info!("Seeding complete! {created} products created");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r"
products:
  - name: Shirt
    price: 10.00
    category: Apparel
  - name: Shoes
    price: 5
    category: Footwear
    imageUrl: https://cdn.example.com/shoes.png
";

    #[test]
    fn test_parses_seed_file() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        assert_eq!(seed.products.len(), 2);
        assert_eq!(seed.products[1].image_url, "https://cdn.example.com/shoes.png");
        assert_eq!(seed.products[0].description, "");
    }

    #[test]
    fn test_negative_price_is_a_parse_error() {
        let raw = "products:\n  - name: Hat\n    price: -1\n    category: Apparel\n";
        assert!(serde_yaml::from_str::<SeedFile>(raw).is_err());
    }

    #[test]
    fn test_validate_reports_every_bad_entry() {
        let raw = r"
products:
  - name: ' '
    price: 1
    category: Apparel
  - name: Hat
    price: 1
    category: Apparel
  - name: Cap
    price: 1
    category: ''
";
        let seed: SeedFile = serde_yaml::from_str(raw).unwrap();
        let Err(SeedError::Invalid(errors)) = validate(seed.products) else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![(0, DraftError::MissingName), (2, DraftError::MissingCategory)]
        );
    }

    #[tokio::test]
    async fn test_create_all_writes_through_editor() {
        let backend = Backend::memory();
        let editor = CatalogEditor::new(Arc::clone(&backend.store));
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();

        let created = create_all(&editor, validate(seed.products).unwrap())
            .await
            .unwrap();
        assert_eq!(created, 2);

        let names: Vec<String> = editor
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Shirt", "Shoes"]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let backend = Backend::memory();
        assert!(matches!(
            products(&backend, "/nonexistent/bazaar-seed.yaml", true).await,
            Err(SeedError::FileNotFound(_))
        ));
    }
}
