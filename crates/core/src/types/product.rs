//! Catalog products.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::Money;

/// A product document from the shared `products` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

/// Errors raised when validating a [`ProductDraft`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("product name is required")]
    MissingName,
    #[error("product category is required")]
    MissingCategory,
    #[error("product price must be at most {max}")]
    PriceTooHigh { max: Money },
}

/// Editable product fields, as submitted by the catalog editor.
///
/// The id is not part of the draft: it is assigned by the store on create
/// and taken from the path on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

impl ProductDraft {
    /// Trim text fields and check the required ones.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] if the name or category is blank, or the
    /// price is above [`Money::MAX_PRICE`].
    pub fn validate(self) -> Result<Self, DraftError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(DraftError::MissingName);
        }
        let category = self.category.trim().to_owned();
        if category.is_empty() {
            return Err(DraftError::MissingCategory);
        }
        if self.price > Money::MAX_PRICE {
            return Err(DraftError::PriceTooHigh {
                max: Money::MAX_PRICE,
            });
        }

        Ok(Self {
            name,
            category,
            description: self.description.trim().to_owned(),
            image_url: self.image_url.trim().to_owned(),
            price: self.price,
        })
    }

    /// Attach an id, producing the stored product.
    #[must_use]
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category: self.category,
            description: self.description,
            image_url: self.image_url,
        }
    }
}

impl From<Product> for ProductDraft {
    fn from(product: Product) -> Self {
        Self {
            name: product.name,
            price: product.price,
            category: product.category,
            description: product.description,
            image_url: product.image_url,
        }
    }
}
