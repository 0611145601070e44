//! Core newtypes shared by the store and the index.

use crate::metadata::MetadataValue;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Open-schema metadata attached to a document: field name to value.
pub type Metadata = HashMap<String, MetadataValue>;

/// A unique identifier for a document in the store.
///
/// Ids are caller supplied or generated, and never change once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Create a new DocumentId.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&DocumentId> for DocumentId {
    #[inline]
    fn from(id: &DocumentId) -> Self {
        id.clone()
    }
}

impl From<DocumentId> for String {
    #[inline]
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_document_id() {
        let id = DocumentId::new("doc-42");
        assert_eq!(id.as_str(), "doc-42");
        assert_eq!(format!("{}", id), "doc-42");

        let id2: DocumentId = "doc-100".into();
        let raw: String = id2.into();
        assert_eq!(raw, "doc-100");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        assert!(!a.is_blank());
    }

    #[test]
    fn test_borrow_lookup() {
        let mut set = HashSet::new();
        set.insert(DocumentId::new("x"));
        assert!(set.contains("x"));
    }

    #[test]
    fn test_blank() {
        assert!(DocumentId::new("   ").is_blank());
        assert!(DocumentId::new("").is_blank());
        assert!(!DocumentId::new("a").is_blank());
    }

    #[test]
    fn test_serde_transparent() {
        let id = DocumentId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
