//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for the storefront's domain.

pub mod cart;
pub mod email;
pub mod id;
pub mod identity;
pub mod money;
pub mod order;
pub mod product;
pub mod status;

pub use cart::{CartLineItem, subtotal};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use money::{Money, MoneyError};
pub use order::{Order, ShippingInfo, ShippingInfoError};
pub use product::{DraftError, Product, ProductDraft};
pub use status::OrderStatus;
