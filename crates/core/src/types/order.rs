//! Orders and shipping details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::CartLineItem;
use super::email::Email;
use super::id::{OrderId, UserId};
use super::money::Money;
use super::status::OrderStatus;

/// Shipping form fields; all four are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

/// A required shipping field was left blank.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("shipping {0} is required")]
pub struct ShippingInfoError(pub &'static str);

impl ShippingInfo {
    /// Trim every field and reject blanks.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingInfoError`] naming the first blank field.
    pub fn validate(self) -> Result<Self, ShippingInfoError> {
        fn required(value: String, field: &'static str) -> Result<String, ShippingInfoError> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ShippingInfoError(field))
            } else {
                Ok(trimmed.to_owned())
            }
        }

        Ok(Self {
            name: required(self.name, "name")?,
            address: required(self.address, "address")?,
            city: required(self.city, "city")?,
            zip_code: required(self.zip_code, "zip code")?,
        })
    }
}

/// An order document at `users/{uid}/orders/{orderId}`.
///
/// Written once by checkout and never modified by the storefront.
/// `created_at` is stamped by the backend; it is `None` only on the copy
/// held before the write is read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub email: Email,
    pub shipping_info: ShippingInfo,
    pub items: Vec<CartLineItem>,
    pub subtotal: Money,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
