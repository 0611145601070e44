//! Explicit configuration for the document store and the metadata index.
//!
//! Every instance receives its configuration at construction; nothing is
//! read from globals or the environment.
//!
//! ```ignore
//! let config = StoreConfig::snapshot("data/docstore")
//!     .with_format(SnapshotFormat::Json)
//!     .with_index_fields(["department", "language"])
//!     .with_auto_persist(true);
//! let store = DocumentStore::open(config)?;
//! ```

use crate::constants::{index::DEFAULT_INDEXED_FIELDS, snapshot};
use crate::persistence::{snapshot_path, SnapshotFormat};
use std::path::PathBuf;

/// Durability backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Keep everything in memory; persist and load are no-ops.
    Memory,
    /// Snapshot files in a directory.
    Snapshot {
        /// Directory holding the snapshot files.
        dir: PathBuf,
        /// Encoding of the snapshot files.
        format: SnapshotFormat,
    },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Snapshot {
            dir: PathBuf::from(snapshot::DEFAULT_DIR),
            format: SnapshotFormat::default(),
        }
    }
}

impl Backend {
    /// Snapshot backend in `dir` with the default format.
    pub fn snapshot(dir: impl Into<PathBuf>) -> Self {
        Backend::Snapshot {
            dir: dir.into(),
            format: SnapshotFormat::default(),
        }
    }

    /// Path of the snapshot file with the given stem, if this backend has one.
    pub fn file(&self, stem: &str) -> Option<(PathBuf, SnapshotFormat)> {
        match self {
            Backend::Memory => None,
            Backend::Snapshot { dir, format } => Some((snapshot_path(dir, stem, *format), *format)),
        }
    }
}

/// Configuration for a [`MetadataIndex`](crate::metadata::MetadataIndex).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexConfig {
    /// Fields to index. `None` indexes every field present on a record.
    pub fields: Option<Vec<String>>,
    /// Where the index snapshot lives.
    pub backend: Backend,
}

impl IndexConfig {
    /// In-memory index over all fields.
    pub fn in_memory() -> Self {
        Self {
            fields: None,
            backend: Backend::Memory,
        }
    }

    /// Set the durability backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Restrict indexing to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict indexing to the ingestion pipeline's default field list.
    pub fn with_default_fields(self) -> Self {
        self.with_fields(DEFAULT_INDEXED_FIELDS.iter().copied())
    }

    /// Snapshot file for the index.
    pub fn snapshot_file(&self) -> Option<(PathBuf, SnapshotFormat)> {
        self.backend.file(snapshot::INDEX_FILE_STEM)
    }
}

/// Configuration for a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Where store and index snapshots live.
    pub backend: Backend,
    /// Field allow-list forwarded to the metadata index.
    pub index_fields: Option<Vec<String>>,
    /// Persist after every `add` and `delete`.
    pub auto_persist: bool,
    /// Required embedding length, when embeddings are stored.
    pub embedding_dimension: Option<usize>,
}

impl StoreConfig {
    /// In-memory store, nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Self::default()
        }
    }

    /// Snapshot-backed store in `dir`.
    pub fn snapshot(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::snapshot(dir),
            ..Self::default()
        }
    }

    /// Set the snapshot format. No effect on the memory backend.
    pub fn with_format(mut self, format: SnapshotFormat) -> Self {
        if let Backend::Snapshot { format: f, .. } = &mut self.backend {
            *f = format;
        }
        self
    }

    /// Restrict metadata indexing to the given fields.
    pub fn with_index_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Persist after every mutation.
    pub fn with_auto_persist(mut self, enabled: bool) -> Self {
        self.auto_persist = enabled;
        self
    }

    /// Require embeddings to have exactly `dim` components.
    pub fn with_embedding_dimension(mut self, dim: usize) -> Self {
        self.embedding_dimension = Some(dim);
        self
    }

    /// Snapshot file for the canonical records.
    pub fn documents_file(&self) -> Option<(PathBuf, SnapshotFormat)> {
        self.backend.file(snapshot::DOCUMENTS_FILE_STEM)
    }

    /// Index configuration derived from this store configuration.
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            fields: self.index_fields.clone(),
            backend: self.backend.clone(),
        }
    }
}
