//! Order history for the signed-in shopper.

use std::sync::Arc;

use bazaar_backend::{
    Direction, DocumentError, DocumentStore, PathError, Query, StoreError, Subscription, paths,
};
use bazaar_core::{Order, UserId};
use thiserror::Error;
use tracing::{instrument, warn};

#[derive(Debug, Error)]
pub enum OrderHistoryError {
    #[error("invalid id: {0}")]
    InvalidId(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

fn orders_query(uid: &UserId) -> Result<Query, PathError> {
    Ok(Query::new(paths::user_orders(uid)?).order_by("createdAt", Direction::Descending))
}

/// Read access to `users/{uid}/orders`.
#[derive(Clone)]
pub struct OrderHistory {
    store: Arc<dyn DocumentStore>,
}

impl OrderHistory {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// A shopper's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document does not decode.
    #[instrument(skip(self), fields(user_id = %uid))]
    pub async fn list(&self, uid: &UserId) -> Result<Vec<Order>, OrderHistoryError> {
        let docs = self.store.list(&orders_query(uid)?).await?;
        Ok(docs
            .iter()
            .map(bazaar_backend::Document::decode)
            .collect::<Result<_, _>>()?)
    }

    /// Follow a shopper's orders as they change.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered.
    pub async fn watch(&self, uid: &UserId) -> Result<OrderFeed, OrderHistoryError> {
        let subscription = self.store.subscribe(orders_query(uid)?).await?;
        Ok(OrderFeed { subscription })
    }
}

/// Live order list; unregisters when dropped.
#[derive(Debug)]
pub struct OrderFeed {
    subscription: Subscription,
}

impl OrderFeed {
    /// The next full order list, or `None` once the store closes the feed.
    /// Orders that fail to decode are skipped.
    pub async fn next(&mut self) -> Option<Vec<Order>> {
        let snapshot = self.subscription.next().await?;
        Some(
            snapshot
                .documents
                .iter()
                .filter_map(|doc| {
                    doc.decode()
                        .map_err(|e| warn!(path = %doc.path, error = %e, "Skipping bad order"))
                        .ok()
                })
                .collect(),
        )
    }
}
