//! Documents and their JSON field maps.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::path::DocumentPath;

/// Top-level fields of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Length of generated document ids.
pub const AUTO_ID_LENGTH: usize = 20;

/// Errors converting between documents and typed values.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("documents must serialize to a JSON object")]
    NotAnObject,
    /// A field the caller relies on is missing or has the wrong type.
    #[error("field {field} of {path} is missing or invalid")]
    InvalidField { path: String, field: &'static str },
}

/// A stored document: its path plus top-level fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocumentPath,
    pub fields: Fields,
}

impl Document {
    #[must_use]
    pub const fn new(path: DocumentPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    /// The document id (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        self.path.id()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the fields, with the document id injected as `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Decode`] if the fields don't match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_owned(), Value::String(self.id().to_owned()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| DocumentError::Decode {
            path: self.path.to_string(),
            source,
        })
    }
}

/// Serialize a value into document fields.
///
/// Any `id` field is dropped: the id lives in the path and is re-injected by
/// [`Document::decode`].
///
/// # Errors
///
/// Returns [`DocumentError`] if serialization fails or doesn't yield an object.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, DocumentError> {
    match serde_json::to_value(value).map_err(DocumentError::Encode)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        _ => Err(DocumentError::NotAnObject),
    }
}

/// Generate a random document id in the hosted store's format.
#[must_use]
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        quantity: u32,
    }

    #[test]
    fn test_decode_injects_id() {
        let fields = json!({"quantity": 2}).as_object().cloned().unwrap();
        let doc = Document::new(DocumentPath::parse("users/u/cart/p1").unwrap(), fields);
        let item: Item = doc.decode().unwrap();
        assert_eq!(item, Item { id: "p1".to_string(), quantity: 2 });
    }

    #[test]
    fn test_encode_drops_id() {
        let fields = encode(&Item { id: "p1".to_string(), quantity: 3 }).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["quantity"], 3);
    }

    #[test]
    fn test_encode_rejects_scalars() {
        assert!(matches!(encode(&5), Err(DocumentError::NotAnObject)));
    }

    #[test]
    fn test_decode_reports_path() {
        let doc = Document::new(DocumentPath::parse("products/p9").unwrap(), Fields::new());
        let err = doc.decode::<Item>().unwrap_err();
        assert!(err.to_string().contains("products/p9"));
    }

    #[test]
    fn test_auto_id_shape() {
        let id = auto_id();
        assert_eq!(id.len(), AUTO_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }
}
