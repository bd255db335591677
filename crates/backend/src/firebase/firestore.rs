//! Firestore REST client.
//!
//! Reads and commits go straight to the REST API. REST has no push channel,
//! so live queries are served by a background task per subscription that
//! re-runs the query after every commit made through this client and on a
//! fixed refresh interval, forwarding only result sets that changed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::{Notify, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

use super::value::{decode_fields, encode_fields, encode_value, field_path};
use crate::config::FirebaseConfig;
use crate::document::Document;
use crate::path::DocumentPath;
use crate::query::{Direction, FilterOp, Query};
use crate::store::{DocumentStore, QuerySnapshot, StoreError, Subscription};
use crate::write::{Write, WriteBatch};

/// Client for the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    /// `https://firestore.googleapis.com/v1`, or the emulator's address
    endpoint: String,
    /// `projects/{project}/databases/(default)/documents`
    root: String,
    auth: RequestAuth,
    refresh_interval: Duration,
    changes: Notify,
}

enum RequestAuth {
    Emulator,
    Bearer(SecretString),
    ApiKey(SecretString),
}

#[derive(Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<RestDocument>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let (endpoint, auth) = match (&config.firestore_emulator_host, &config.access_token) {
            (Some(host), _) => (format!("http://{host}/v1"), RequestAuth::Emulator),
            (None, Some(token)) => (
                "https://firestore.googleapis.com/v1".to_string(),
                RequestAuth::Bearer(token.clone()),
            ),
            (None, None) => (
                "https://firestore.googleapis.com/v1".to_string(),
                RequestAuth::ApiKey(config.api_key.clone()),
            ),
        };

        Self {
            inner: Arc::new(FirestoreClientInner {
                client: reqwest::Client::new(),
                endpoint,
                root: format!("projects/{}/databases/(default)/documents", config.project_id),
                auth,
                refresh_interval: config.refresh_interval,
                changes: Notify::new(),
            }),
        }
    }

    fn url(&self, resource: &str) -> String {
        let url = format!("{}/{resource}", self.inner.endpoint);
        match &self.inner.auth {
            RequestAuth::ApiKey(key) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("key", key.expose_secret())
                    .finish();
                format!("{url}?{query}")
            }
            RequestAuth::Emulator | RequestAuth::Bearer(_) => url,
        }
    }

    fn full_name(&self, path: &DocumentPath) -> String {
        format!("{}/{path}", self.inner.root)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.inner.auth {
            RequestAuth::Emulator => request.bearer_auth("owner"),
            RequestAuth::Bearer(token) => request.bearer_auth(token.expose_secret()),
            RequestAuth::ApiKey(_) => request,
        }
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Returns `Ok(None)` for 404 so callers can decide what absence means.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Firestore returned non-success status"
            );
            let message = format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            );
            return Err(match status {
                reqwest::StatusCode::TOO_MANY_REQUESTS
                | reqwest::StatusCode::SERVICE_UNAVAILABLE
                | reqwest::StatusCode::GATEWAY_TIMEOUT
                | reqwest::StatusCode::INTERNAL_SERVER_ERROR => StoreError::Unavailable(message),
                _ => StoreError::Rejected(message),
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        Ok(Some(serde_json::from_str(&response_text)?))
    }

    fn to_document(&self, rest: RestDocument) -> Result<Document, StoreError> {
        let relative = rest
            .name
            .strip_prefix(&self.inner.root)
            .map_or(rest.name.as_str(), |tail| tail.trim_start_matches('/'));
        let path = DocumentPath::parse(relative)?;
        Ok(Document::new(path, decode_fields(&rest.fields)?))
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let parent = match query.collection.parent() {
            Some(doc) => format!("{}/{doc}", self.inner.root),
            None => self.inner.root.clone(),
        };
        let body = json!({ "structuredQuery": structured_query(query) });
        let request = self
            .inner
            .client
            .post(self.url(&format!("{parent}:runQuery")))
            .json(&body);

        let Some(response) = self.execute(request).await? else {
            return Ok(Vec::new());
        };
        let items: Vec<RunQueryItem> = serde_json::from_value(response)?;
        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|doc| self.to_document(doc))
            .collect()
    }

    fn encode_write(&self, write: &Write) -> Value {
        match write {
            Write::Set {
                path,
                fields,
                merge,
                server_timestamps,
            } => {
                let mut encoded = json!({
                    "update": { "name": self.full_name(path), "fields": encode_fields(fields) },
                });
                if *merge {
                    encoded["updateMask"] = update_mask(fields.keys());
                }
                if !server_timestamps.is_empty() {
                    let transforms: Vec<Value> = server_timestamps
                        .iter()
                        .map(|field| {
                            json!({ "fieldPath": field_path(field), "setToServerValue": "REQUEST_TIME" })
                        })
                        .collect();
                    encoded["updateTransforms"] = Value::Array(transforms);
                }
                encoded
            }
            Write::Update { path, fields } => json!({
                "update": { "name": self.full_name(path), "fields": encode_fields(fields) },
                "updateMask": update_mask(fields.keys()),
                "currentDocument": { "exists": true },
            }),
            Write::Delete { path } => json!({ "delete": self.full_name(path) }),
        }
    }

    async fn poll(self, query: Query, sender: mpsc::UnboundedSender<QuerySnapshot>) {
        let mut ticker = tokio::time::interval(self.inner.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let mut last: Option<QuerySnapshot> = None;
        loop {
            let changed = self.inner.changes.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            match self.run_query(&query).await {
                Ok(documents) => {
                    let snapshot = QuerySnapshot::new(documents);
                    if last.as_ref() != Some(&snapshot) {
                        if sender.send(snapshot.clone()).is_err() {
                            break;
                        }
                        last = Some(snapshot);
                    }
                }
                Err(e) => warn!(error = %e, collection = %query.collection, "Live query refresh failed"),
            }

            tokio::select! {
                _ = ticker.tick() => {}
                () = &mut changed => {}
                () = sender.closed() => break,
            }
        }
        debug!(collection = %query.collection, "Live query stopped");
    }
}

fn update_mask<'a>(fields: impl Iterator<Item = &'a String>) -> Value {
    let paths: Vec<String> = fields.map(|f| field_path(f)).collect();
    json!({ "fieldPaths": paths })
}

const fn op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "EQUAL",
        FilterOp::Lt => "LESS_THAN",
        FilterOp::Lte => "LESS_THAN_OR_EQUAL",
        FilterOp::Gt => "GREATER_THAN",
        FilterOp::Gte => "GREATER_THAN_OR_EQUAL",
    }
}

fn structured_query(query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": query.collection.id() }],
    });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(&f.field) },
                    "op": op_name(f.op),
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
    }

    if !query.order_by.is_empty() {
        let order: Vec<Value> = query
            .order_by
            .iter()
            .map(|o| {
                json!({
                    "field": { "fieldPath": field_path(&o.field) },
                    "direction": match o.direction {
                        Direction::Ascending => "ASCENDING",
                        Direction::Descending => "DESCENDING",
                    },
                })
            })
            .collect();
        structured["orderBy"] = Value::Array(order);
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    structured
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let request = self.inner.client.get(self.url(&self.full_name(path)));
        match self.execute(request).await? {
            Some(body) => {
                let rest: RestDocument = serde_json::from_value(body)?;
                Ok(Some(self.to_document(rest)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, query), fields(collection = %query.collection))]
    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.run_query(query).await
    }

    #[instrument(skip(self, batch), fields(writes = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let writes: Vec<Value> = batch.writes().iter().map(|w| self.encode_write(w)).collect();
        let request = self
            .inner
            .client
            .post(self.url(&format!("{}:commit", self.inner.root)))
            .json(&json!({ "writes": writes }));

        match self.execute(request).await? {
            Some(_) => {
                self.inner.changes.notify_waiters();
                Ok(())
            }
            // The only 404 a commit produces is a failed `exists` precondition.
            None => Err(StoreError::NotFound(
                batch
                    .writes()
                    .iter()
                    .find(|w| matches!(w, Write::Update { .. }))
                    .map_or_else(String::new, |w| w.path().to_string()),
            )),
        }
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.clone().poll(query, sender));
        Ok(Subscription::new(receiver, move || task.abort()))
    }
}
