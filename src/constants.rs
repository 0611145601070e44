//! Named constants for configuration values.
//!
//! This module centralizes file names and default values used throughout
//! the codebase, making them easier to find and document.

/// Constants for snapshot files.
pub mod snapshot {
    /// Base file name of the canonical document snapshot.
    pub const DOCUMENTS_FILE_STEM: &str = "documents";

    /// Base file name of the metadata index snapshot.
    pub const INDEX_FILE_STEM: &str = "metadata_index";

    /// Extension used by binary snapshots.
    pub const BINARY_EXTENSION: &str = "fds";

    /// Extension used by JSON snapshots.
    pub const JSON_EXTENSION: &str = "json";

    /// Suffix appended to a snapshot path while it is being written.
    pub const TEMP_SUFFIX: &str = "tmp";

    /// Default snapshot directory.
    pub const DEFAULT_DIR: &str = "data/docstore";
}

/// Constants for the metadata index.
pub mod index {
    /// Fields indexed by the ingestion pipeline when it restricts indexing.
    pub const DEFAULT_INDEXED_FIELDS: &[&str] =
        &["filename", "file_type", "department", "category", "language"];
}

/// Constants for store statistics.
pub mod stats {
    /// Bucket used when a record lacks the aggregated field.
    pub const UNKNOWN_BUCKET: &str = "unknown";

    /// Metadata field aggregated into `by_file_type`.
    pub const FILE_TYPE_FIELD: &str = "file_type";

    /// Metadata field aggregated into `by_language`.
    pub const LANGUAGE_FIELD: &str = "language";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stems_differ() {
        assert_ne!(snapshot::DOCUMENTS_FILE_STEM, snapshot::INDEX_FILE_STEM);
    }

    #[test]
    fn test_default_fields_cover_statistics() {
        assert!(index::DEFAULT_INDEXED_FIELDS.contains(&stats::FILE_TYPE_FIELD));
        assert!(index::DEFAULT_INDEXED_FIELDS.contains(&stats::LANGUAGE_FIELD));
    }
}
