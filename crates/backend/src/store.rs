//! The document store seam.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::document::{Document, DocumentError, Fields, auto_id};
use crate::path::{CollectionPath, DocumentPath, PathError};
use crate::query::Query;
use crate::write::{Write, WriteBatch};

/// Errors returned by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A precondition required the document to exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or refused service.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the request (permissions, invalid data).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The full result set of a query at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub documents: Vec<Document>,
}

impl QuerySnapshot {
    #[must_use]
    pub const fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Decode every document, failing on the first that doesn't fit `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Decode`] naming the offending document.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, DocumentError> {
        self.documents.iter().map(Document::decode).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

type Cancel = Box<dyn FnOnce() + Send>;

/// A live query registration.
///
/// Yields the current result set first, then a new snapshot each time it
/// changes, in the order the store produced them. Dropping the subscription
/// unregisters it.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<QuerySnapshot>,
    cancel: Option<Cancel>,
}

impl Subscription {
    /// Wrap a snapshot channel; `cancel` runs once when the subscription ends.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<QuerySnapshot>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Wait for the next snapshot. Returns `None` once the store has closed
    /// the feed. Cancel safe.
    pub async fn next(&mut self) -> Option<QuerySnapshot> {
        self.receiver.recv().await
    }

    /// Wait for a snapshot, then skip ahead to the newest one queued.
    /// Cancel safe.
    pub async fn latest(&mut self) -> Option<QuerySnapshot> {
        let mut snapshot = self.receiver.recv().await?;
        while let Ok(newer) = self.receiver.try_recv() {
            snapshot = newer;
        }
        Some(snapshot)
    }

    /// Unregister explicitly.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        self.receiver.close();
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// A hosted document database.
///
/// Implementations must apply each [`WriteBatch`] atomically and deliver
/// subscription snapshots per query in commit order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `Ok(None)` if it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Run a query once.
    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply every write in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Register a live query.
    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError>;

    /// Create or overwrite a document.
    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<(), StoreError> {
        let write = if merge {
            Write::merge(path.clone(), fields)
        } else {
            Write::set(path.clone(), fields)
        };
        self.commit(write.into()).await
    }

    /// Merge fields into an existing document.
    async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.commit(Write::update(path.clone(), fields).into()).await
    }

    /// Delete a document; absent documents are not an error.
    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.commit(Write::delete(path.clone()).into()).await
    }

    /// Create a document with a generated id and return its path.
    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, StoreError> {
        let path = collection.doc(&auto_id())?;
        self.set(&path, fields, false).await?;
        Ok(path)
    }
}
