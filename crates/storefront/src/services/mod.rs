//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `identity` - Mirror of the auth provider's current identity
//! - `auth` - Sign-in, sign-up, sign-out and password reset
//! - `cart` - Live per-shopper cart with write-through mutations
//! - `catalog` - Product listing, lookup, category filter and prefix search
//! - `checkout` - Order commit and the checkout step machine
//! - `orders` - Order history
//!
//! Services are plain structs over `Arc<dyn DocumentStore>`; the HTTP layer
//! holds one set per process (catalog, checkout commit, orders) and one
//! identity session plus cart per shopper (see [`crate::client`]).

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod identity;
pub mod orders;

pub use auth::{AuthError, AuthService, MIN_PASSWORD_LENGTH, SignUp};
pub use cart::{CartError, CartMirror, CartStore, KeyedLocks};
pub use catalog::{
    ALL_CATEGORIES, CATEGORIES, CatalogAccess, CatalogError, CategoryFilter, FEATURED_LIMIT,
    ProductFilter,
};
pub use checkout::{
    CheckoutCommit, CheckoutError, CheckoutFlow, CheckoutStep, CommitStrategy, FlowError,
    PaymentDetails,
};
pub use identity::{IdentitySession, Unauthenticated};
pub use orders::{OrderFeed, OrderHistory, OrderHistoryError};
