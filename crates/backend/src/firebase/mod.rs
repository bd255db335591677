//! Firebase adapters: Identity Toolkit for auth, Firestore for documents.
//!
//! Both speak the public REST APIs with `reqwest`, and both honour the
//! emulator suite's `*_EMULATOR_HOST` settings for local development.

mod auth;
mod firestore;
mod value;

pub use auth::{FirebaseAuthConnector, FirebaseAuthSession};
pub use firestore::FirestoreClient;
