//! Cart line items and the derived subtotal.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::{Money, MoneyError};
use super::product::Product;

/// One product in a shopper's cart.
///
/// Stored at `users/{uid}/cart/{productId}` with the product fields copied
/// in, so the cart renders without reading the catalog. The document id and
/// `id` are the product id. `quantity` is always at least 1: a line whose
/// quantity would drop to zero is deleted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: ProductId,
    pub quantity: u32,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

impl CartLineItem {
    /// Largest quantity a single line may hold.
    pub const MAX_QUANTITY: u32 = 999;

    /// Snapshot a product into a new line.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: product.id.clone(),
            quantity,
            name: product.name.clone(),
            price: product.price,
            category: product.category.clone(),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
        }
    }

    /// `price * quantity` for this line.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the total is out of range.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.price.checked_times(self.quantity)
    }
}

/// Sum of `price * quantity` over the given lines.
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] if any line total or the sum is out of
/// range. Lines written by other clients are not bounded by this crate's
/// limits, so callers must not assume success.
pub fn subtotal(items: &[CartLineItem]) -> Result<Money, MoneyError> {
    items
        .iter()
        .try_fold(Money::ZERO, |total, item| total.checked_add(item.line_total()?))
}
