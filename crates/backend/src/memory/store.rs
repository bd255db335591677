use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::document::{Document, Fields};
use crate::path::DocumentPath;
use crate::query::Query;
use crate::store::{DocumentStore, QuerySnapshot, StoreError, Subscription};
use crate::write::{Write, WriteBatch};

/// Thread-safe in-memory [`DocumentStore`].
///
/// Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    control: Mutex<Control>,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<DocumentPath, Fields>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    clock: Option<DateTime<Utc>>,
    log: Vec<Write>,
}

struct Listener {
    query: Query,
    sender: mpsc::UnboundedSender<QuerySnapshot>,
    last: QuerySnapshot,
}

#[derive(Default)]
struct Control {
    skip: usize,
    failures: usize,
    latency: Option<Duration>,
    read_latency: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `skip` commits through, then fail the following `count`
    /// with [`StoreError::Unavailable`]. Failed commits change nothing.
    pub fn fail_writes(&self, skip: usize, count: usize) {
        let mut control = lock(&self.inner.control);
        control.skip = skip;
        control.failures = count;
    }

    /// Delay every commit by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        lock(&self.inner.control).latency = latency;
    }

    /// Delay every `list` result by `latency`. The result reflects the data
    /// as it was when the call started.
    pub fn set_read_latency(&self, latency: Option<Duration>) {
        lock(&self.inner.control).read_latency = latency;
    }

    /// Every write applied so far, in commit order.
    #[must_use]
    pub fn write_log(&self) -> Vec<Write> {
        lock(&self.inner.state).log.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.state).listeners.len()
    }

    /// Number of stored documents across all collections.
    #[must_use]
    pub fn document_count(&self) -> usize {
        lock(&self.inner.state).docs.len()
    }

    fn injected_failure(&self) -> bool {
        let mut control = lock(&self.inner.control);
        if control.skip > 0 {
            control.skip -= 1;
            return false;
        }
        if control.failures > 0 {
            control.failures -= 1;
            return true;
        }
        false
    }
}

impl State {
    fn snapshot(&self, query: &Query) -> QuerySnapshot {
        let candidates = self
            .docs
            .iter()
            .filter(|(path, _)| path.collection() == query.collection)
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()));
        QuerySnapshot::new(query.apply(candidates))
    }

    /// Commit time, strictly increasing across commits.
    fn tick(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(previous) = self.clock
            && now <= previous
        {
            now = previous + chrono::Duration::microseconds(1);
        }
        self.clock = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn apply(&mut self, write: Write, timestamp: &str) {
        match write {
            Write::Set {
                path,
                mut fields,
                merge,
                server_timestamps,
            } => {
                for field in server_timestamps {
                    fields.insert(field, Value::String(timestamp.to_owned()));
                }
                match self.docs.get_mut(&path) {
                    Some(existing) if merge => existing.extend(fields),
                    _ => {
                        self.docs.insert(path, fields);
                    }
                }
            }
            Write::Update { path, fields } => {
                if let Some(existing) = self.docs.get_mut(&path) {
                    existing.extend(fields);
                }
            }
            Write::Delete { path } => {
                self.docs.remove(&path);
            }
        }
    }

    fn notify(&mut self) {
        let mut closed = Vec::new();
        let updates: Vec<(u64, QuerySnapshot)> = self
            .listeners
            .iter()
            .map(|(id, listener)| (*id, self.snapshot(&listener.query)))
            .collect();

        for (id, snapshot) in updates {
            let Some(listener) = self.listeners.get_mut(&id) else {
                continue;
            };
            if listener.last == snapshot {
                continue;
            }
            if listener.sender.send(snapshot.clone()).is_err() {
                closed.push(id);
                continue;
            }
            listener.last = snapshot;
        }

        for id in closed {
            self.listeners.remove(&id);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let state = lock(&self.inner.state);
        Ok(state
            .docs
            .get(path)
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let documents = lock(&self.inner.state).snapshot(query).documents;
        let latency = lock(&self.inner.control).read_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(documents)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let latency = lock(&self.inner.control).latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.injected_failure() {
            warn!(writes = batch.len(), "Injected write failure");
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }

        let mut state = lock(&self.inner.state);
        for write in batch.writes() {
            if let Write::Update { path, .. } = write
                && !state.docs.contains_key(path)
            {
                return Err(StoreError::NotFound(path.to_string()));
            }
        }

        let timestamp = state.tick();
        debug!(writes = batch.len(), "Committing batch");
        for write in batch.into_writes() {
            state.log.push(write.clone());
            state.apply(write, &timestamp);
        }
        state.notify();
        Ok(())
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = lock(&self.inner.state);

        let initial = state.snapshot(&query);
        // The receiver is held right here, so this cannot fail.
        let _ = sender.send(initial.clone());

        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.insert(
            id,
            Listener {
                query,
                sender,
                last: initial,
            },
        );
        drop(state);

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(receiver, move || {
            if let Some(inner) = inner.upgrade() {
                lock(&inner.state).listeners.remove(&id);
            }
        }))
    }
}
