//! Business logic services for admin.

pub mod catalog_editor;

pub use catalog_editor::{CONFIRMATION_TTL, CatalogEditor, DeleteConfirmation, EditorError};
