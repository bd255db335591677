//! Write operations and atomic batches.

use crate::document::Fields;
use crate::path::DocumentPath;

/// A single mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite a document. With `merge`, only the given top-level
    /// fields are replaced. Each field named in `server_timestamps` is set to
    /// the store's commit time.
    Set {
        path: DocumentPath,
        fields: Fields,
        merge: bool,
        server_timestamps: Vec<String>,
    },
    /// Merge fields into an existing document; fails with `NotFound` if the
    /// document does not exist when the batch commits.
    Update { path: DocumentPath, fields: Fields },
    /// Remove a document. Deleting an absent document succeeds.
    Delete { path: DocumentPath },
}

impl Write {
    #[must_use]
    pub const fn set(path: DocumentPath, fields: Fields) -> Self {
        Self::Set {
            path,
            fields,
            merge: false,
            server_timestamps: Vec::new(),
        }
    }

    #[must_use]
    pub const fn merge(path: DocumentPath, fields: Fields) -> Self {
        Self::Set {
            path,
            fields,
            merge: true,
            server_timestamps: Vec::new(),
        }
    }

    #[must_use]
    pub const fn update(path: DocumentPath, fields: Fields) -> Self {
        Self::Update { path, fields }
    }

    #[must_use]
    pub const fn delete(path: DocumentPath) -> Self {
        Self::Delete { path }
    }

    /// Stamp `field` with the commit time. Only meaningful on `Set`.
    #[must_use]
    pub fn with_server_timestamp(mut self, field: &str) -> Self {
        if let Self::Set {
            server_timestamps, ..
        } = &mut self
        {
            server_timestamps.push(field.to_owned());
        }
        self
    }

    #[must_use]
    pub const fn path(&self) -> &DocumentPath {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// An ordered list of writes committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn set(&mut self, path: DocumentPath, fields: Fields) -> &mut Self {
        self.push(Write::set(path, fields))
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.push(Write::delete(path))
    }

    #[must_use]
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    #[must_use]
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl From<Write> for WriteBatch {
    fn from(write: Write) -> Self {
        Self {
            writes: vec![write],
        }
    }
}

impl FromIterator<Write> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = Write>>(iter: I) -> Self {
        Self {
            writes: iter.into_iter().collect(),
        }
    }
}
