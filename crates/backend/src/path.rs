//! Slash-separated document store paths.
//!
//! Paths alternate collection and document segments: a collection path has
//! an odd number of segments (`products`, `users/u1/cart`), a document path
//! an even number (`products/p1`, `users/u1/cart/p1`).

use core::fmt;

use bazaar_core::{OrderId, ProductId, UserId};
use thiserror::Error;

/// Errors raised when building a path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("invalid path segment {0:?}")]
    InvalidSegment(String),
    #[error("{path} is not a {expected} path")]
    WrongKind { path: String, expected: &'static str },
}

fn check_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
        return Err(PathError::InvalidSegment(segment.to_owned()));
    }
    Ok(())
}

fn check_path(raw: &str, odd: bool, expected: &'static str) -> Result<(), PathError> {
    if raw.is_empty() {
        return Err(PathError::Empty);
    }
    let mut count = 0usize;
    for segment in raw.split('/') {
        check_segment(segment)?;
        count += 1;
    }
    if (count % 2 == 1) != odd {
        return Err(PathError::WrongKind {
            path: raw.to_owned(),
            expected,
        });
    }
    Ok(())
}

/// Path of a collection, e.g. `users/u1/cart`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

/// Path of a single document, e.g. `users/u1/cart/p1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl CollectionPath {
    /// Parse a collection path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] for empty segments or an even segment count.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        check_path(raw, true, "collection")?;
        Ok(Self(raw.to_owned()))
    }

    /// Path of the document `id` inside this collection.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidSegment`] if `id` is empty or contains `/`.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, PathError> {
        check_segment(id)?;
        Ok(DocumentPath(format!("{}/{id}", self.0)))
    }

    /// Last segment (the collection id).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The document this collection is nested under, if any.
    #[must_use]
    pub fn parent(&self) -> Option<DocumentPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| DocumentPath(parent.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentPath {
    /// Parse a document path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] for empty segments or an odd segment count.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        check_path(raw, false, "document")?;
        Ok(Self(raw.to_owned()))
    }

    /// Last segment (the document id).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The collection containing this document.
    #[must_use]
    pub fn collection(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((collection, _)) => CollectionPath(collection.to_owned()),
            None => CollectionPath(self.0.clone()),
        }
    }

    /// A subcollection of this document.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidSegment`] for an invalid collection id.
    pub fn child(&self, collection: &str) -> Result<CollectionPath, PathError> {
        check_segment(collection)?;
        Ok(CollectionPath(format!("{}/{collection}", self.0)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Storefront layout
// =============================================================================

const PRODUCTS: &str = "products";
const USERS: &str = "users";
const CART: &str = "cart";
const ORDERS: &str = "orders";

/// `products`
#[must_use]
pub fn products() -> CollectionPath {
    CollectionPath(PRODUCTS.to_owned())
}

/// `products/{productId}`
///
/// # Errors
///
/// Returns [`PathError`] if the id is not a valid segment.
pub fn product(id: &ProductId) -> Result<DocumentPath, PathError> {
    products().doc(id.as_str())
}

fn user(uid: &UserId) -> Result<DocumentPath, PathError> {
    CollectionPath(USERS.to_owned()).doc(uid.as_str())
}

/// `users/{uid}/cart`
///
/// # Errors
///
/// Returns [`PathError`] if the uid is not a valid segment.
pub fn user_cart(uid: &UserId) -> Result<CollectionPath, PathError> {
    user(uid)?.child(CART)
}

/// `users/{uid}/cart/{productId}`
///
/// # Errors
///
/// Returns [`PathError`] if either id is not a valid segment.
pub fn cart_item(uid: &UserId, product_id: &ProductId) -> Result<DocumentPath, PathError> {
    user_cart(uid)?.doc(product_id.as_str())
}

/// `users/{uid}/orders`
///
/// # Errors
///
/// Returns [`PathError`] if the uid is not a valid segment.
pub fn user_orders(uid: &UserId) -> Result<CollectionPath, PathError> {
    user(uid)?.child(ORDERS)
}

/// `users/{uid}/orders/{orderId}`
///
/// # Errors
///
/// Returns [`PathError`] if either id is not a valid segment.
pub fn order(uid: &UserId, order_id: &OrderId) -> Result<DocumentPath, PathError> {
    user_orders(uid)?.doc(order_id.as_str())
}
