//! Cart store: a live mirror of `users/{uid}/cart` plus write-through
//! mutations.
//!
//! A background task follows the identity session. While signed in it holds
//! a subscription on the shopper's cart collection and replaces the mirror
//! with every snapshot; when the identity goes away it drops the
//! subscription and clears the mirror. Mutations go straight to the document
//! store and reach the mirror through the subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bazaar_backend::{
    DocumentError, DocumentPath, DocumentStore, Fields, PathError, Query, StoreError, Write,
    encode, paths,
};
use bazaar_core::{
    CartLineItem, Identity, Money, MoneyError, Product, ProductId, UserId, subtotal,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::identity::{IdentitySession, Unauthenticated};

/// Errors returned by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No shopper is signed in; nothing was written.
    #[error("sign in to manage your cart")]
    Unauthenticated,

    /// Quantity update for a product that is not in the cart.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    #[error("quantity {0} is out of range")]
    InvalidQuantity(i64),

    #[error("cart total is out of range: {0}")]
    Total(#[from] MoneyError),

    #[error("invalid id: {0}")]
    InvalidId(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<Unauthenticated> for CartError {
    fn from(_: Unauthenticated) -> Self {
        Self::Unauthenticated
    }
}

/// Per-document async locks shared by every cart in the process.
///
/// Serializes the read-then-write of concurrent adds for the same
/// `(user, product)` so increments are not lost between this server's
/// clients. Writers outside this process still race.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<DocumentPath, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock(&self, path: &DocumentPath) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(path.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Mirrored cart contents and whose cart they are.
///
/// `revision` goes up on every replacement, so a reader can tell whether
/// the mirror moved while it was away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMirror {
    pub owner: Option<UserId>,
    pub items: Vec<CartLineItem>,
    pub revision: u64,
}

impl CartMirror {
    fn replace(&mut self, owner: Option<UserId>, items: Vec<CartLineItem>) {
        self.owner = owner;
        self.items = items;
        self.revision += 1;
    }
}

/// One client's cart.
pub struct CartStore {
    store: Arc<dyn DocumentStore>,
    identity: watch::Receiver<Option<Identity>>,
    mirror: Arc<watch::Sender<CartMirror>>,
    open: AtomicBool,
    locks: KeyedLocks,
    task: JoinHandle<()>,
}

impl CartStore {
    /// Start mirroring the cart of whoever is signed in to `session`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, session: &IdentitySession, locks: KeyedLocks) -> Self {
        let mirror = Arc::new(watch::channel(CartMirror::default()).0);
        let task = tokio::spawn(sync(
            Arc::clone(&store),
            session.watch(),
            Arc::clone(&mirror),
        ));

        Self {
            store,
            identity: session.watch(),
            mirror,
            open: AtomicBool::new(false),
            locks,
            task,
        }
    }

    fn require(&self) -> Result<Identity, CartError> {
        self.identity
            .borrow()
            .clone()
            .ok_or(CartError::Unauthenticated)
    }

    fn owner(&self) -> Option<UserId> {
        self.identity.borrow().as_ref().map(|i| i.uid.clone())
    }

    /// Current line items.
    ///
    /// Empty while signed out, and never another shopper's lines even if the
    /// sync task has not yet caught up with an identity change.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        let owner = self.owner();
        let mirror = self.mirror.borrow();
        if owner.is_some() && mirror.owner == owner {
            mirror.items.clone()
        } else {
            Vec::new()
        }
    }

    /// Sum of `price * quantity`, recomputed on every call.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Total`] if the lines add up past the
    /// representable range.
    pub fn subtotal(&self) -> Result<Money, CartError> {
        Ok(subtotal(&self.items())?)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items().iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Receive the mirror every time it changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CartMirror> {
        self.mirror.subscribe()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Relaxed);
    }

    /// Flip the slide-over visibility; returns the new state.
    pub fn toggle_open(&self) -> bool {
        !self.open.fetch_xor(true, Ordering::Relaxed)
    }

    /// Add one unit of `product`, creating the line on first add.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Unauthenticated`] while signed out,
    /// [`CartError::InvalidQuantity`] once the line holds
    /// [`CartLineItem::MAX_QUANTITY`], or a store error if the read or write
    /// fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product) -> Result<u32, CartError> {
        let identity = self.require()?;
        let path = paths::cart_item(&identity.uid, &product.id)?;
        let _guard = self.locks.lock(&path).await;

        let quantity = match self.store.get(&path).await? {
            Some(existing) => {
                let quantity = line_quantity(&existing)?.saturating_add(1);
                if quantity > CartLineItem::MAX_QUANTITY {
                    return Err(CartError::InvalidQuantity(i64::from(quantity)));
                }
                self.store.update(&path, quantity_fields(quantity)).await?;
                quantity
            }
            None => {
                let line = CartLineItem::from_product(product, 1);
                self.store.set(&path, encode(&line)?, false).await?;
                1
            }
        };

        info!(user_id = %identity.uid, quantity, "Added to cart");
        Ok(quantity)
    }

    /// Delete the line for `product_id`; absent lines are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Unauthenticated`] while signed out, or a store
    /// error if the delete fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<(), CartError> {
        let identity = self.require()?;
        let path = paths::cart_item(&identity.uid, product_id)?;
        let _guard = self.locks.lock(&path).await;

        self.store.delete(&path).await?;
        info!(user_id = %identity.uid, "Removed from cart");
        Ok(())
    }

    /// Set a line's quantity; zero or below deletes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when setting a positive quantity
    /// on a product that is not in the cart, [`CartError::InvalidQuantity`]
    /// above [`CartLineItem::MAX_QUANTITY`], and
    /// [`CartError::Unauthenticated`] while signed out.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_from_cart(product_id).await;
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= CartLineItem::MAX_QUANTITY)
            .ok_or(CartError::InvalidQuantity(quantity))?;

        let identity = self.require()?;
        let path = paths::cart_item(&identity.uid, product_id)?;
        let _guard = self.locks.lock(&path).await;

        match self.store.update(&path, quantity_fields(quantity)).await {
            Ok(()) => {
                info!(user_id = %identity.uid, quantity, "Updated cart quantity");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(CartError::LineNotFound(product_id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read the cart collection and replace the mirror.
    ///
    /// Gives a caller its own writes without waiting for the subscription.
    /// The result is dropped if the mirror was replaced while reading, since
    /// that replacement is at least as recent.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error if the read fails; the mirror is left
    /// unchanged then.
    pub async fn refresh(&self) -> Result<(), CartError> {
        let Some(owner) = self.owner() else {
            return Ok(());
        };
        let seen = self.mirror.borrow().revision;
        let query = Query::new(paths::user_cart(&owner)?);
        let items = self
            .store
            .list(&query)
            .await?
            .iter()
            .map(|doc| doc.decode())
            .collect::<Result<Vec<CartLineItem>, _>>()?;

        // Discard if the shopper changed while we were reading.
        let still_owner = self.owner().as_ref() == Some(&owner);
        let applied = self.mirror.send_if_modified(|mirror| {
            if !still_owner || mirror.revision != seen {
                return false;
            }
            mirror.replace(Some(owner), items);
            true
        });
        if !applied {
            debug!("Dropping cart read overtaken by a newer snapshot");
        }
        Ok(())
    }
}

impl Drop for CartStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn quantity_fields(quantity: u32) -> Fields {
    let mut fields = Fields::new();
    fields.insert("quantity".to_owned(), Value::from(quantity));
    fields
}

fn line_quantity(doc: &bazaar_backend::Document) -> Result<u32, DocumentError> {
    doc.get("quantity")
        .and_then(Value::as_u64)
        .and_then(|q| u32::try_from(q).ok())
        .ok_or_else(|| DocumentError::InvalidField {
            path: doc.path.to_string(),
            field: "quantity",
        })
}

/// Follow identity changes, holding a cart subscription while signed in.
async fn sync(
    store: Arc<dyn DocumentStore>,
    mut identity: watch::Receiver<Option<Identity>>,
    mirror: Arc<watch::Sender<CartMirror>>,
) {
    loop {
        let current = identity.borrow_and_update().clone();
        let Some(current) = current else {
            mirror.send_modify(|mirror| mirror.replace(None, Vec::new()));
            if identity.changed().await.is_err() {
                return;
            }
            continue;
        };

        let subscription = match paths::user_cart(&current.uid) {
            Ok(cart) => store.subscribe(Query::new(cart)).await.map_err(CartError::from),
            Err(e) => Err(e.into()),
        };
        let mut subscription = match subscription {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(user_id = %current.uid, error = %e, "Cart subscription failed");
                if identity.changed().await.is_err() {
                    return;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                biased;
                changed = identity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                snapshot = subscription.latest() => {
                    let Some(snapshot) = snapshot else {
                        warn!(user_id = %current.uid, "Cart feed closed");
                        if identity.changed().await.is_err() {
                            return;
                        }
                        break;
                    };
                    match snapshot.decode_all::<CartLineItem>() {
                        Ok(items) => {
                            let owner = Some(current.uid.clone());
                            mirror.send_modify(|mirror| mirror.replace(owner, items));
                        }
                        Err(e) => warn!(user_id = %current.uid, error = %e, "Skipping undecodable cart snapshot"),
                    }
                }
            }
        }
        // Dropping the subscription here unregisters it before the next
        // identity is handled.
        drop(subscription);
    }
}
