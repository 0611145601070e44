//! The canonical document record.

use crate::error::{DocStoreError, Result};
use crate::metadata::{Indexable, MetadataValue};
use crate::types::{DocumentId, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document: text, open-schema metadata and an optional embedding.
///
/// `stored_at` and `updated_at` are stamped by the store; values set on a
/// document before it is added are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, immutable once stored.
    pub id: DocumentId,
    /// Text payload.
    pub text: String,
    /// Arbitrary key-value metadata.
    pub metadata: Metadata,
    /// Embedding produced upstream, stored opaquely.
    pub embedding: Option<Vec<f32>>,
    stored_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a document with a freshly generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(DocumentId::generate(), text)
    }

    /// Create a document with a caller-supplied id.
    pub fn with_id(id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
            embedding: None,
            stored_at: None,
            updated_at: None,
        }
    }

    /// Add a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// When the document was first stored.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored_at
    }

    /// When the document was last replaced, if ever.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Length of the text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Check the record can be stored.
    ///
    /// # Errors
    /// Returns [`DocStoreError::Validation`] for a blank id, a NaN or
    /// infinite float in the metadata, a non-finite embedding component, or
    /// an embedding whose length differs from `embedding_dimension`.
    pub fn validate(&self, embedding_dimension: Option<usize>) -> Result<()> {
        if self.id.is_blank() {
            return Err(DocStoreError::validation(self.id.as_str(), "id is empty"));
        }

        let mut non_finite: Vec<&str> = self
            .metadata
            .iter()
            .filter(|(_, value)| !value.is_finite())
            .map(|(field, _)| field.as_str())
            .collect();
        if !non_finite.is_empty() {
            non_finite.sort_unstable();
            return Err(DocStoreError::validation(
                self.id.as_str(),
                format!("metadata field '{}' is not a finite number", non_finite.join("', '")),
            ));
        }

        if let Some(embedding) = &self.embedding {
            if let Some(dim) = embedding_dimension {
                if embedding.len() != dim {
                    return Err(DocStoreError::validation(
                        self.id.as_str(),
                        format!("embedding dimension mismatch: expected {}, got {}", dim, embedding.len()),
                    ));
                }
            }
            if let Some(pos) = embedding.iter().position(|x| !x.is_finite()) {
                return Err(DocStoreError::validation(
                    self.id.as_str(),
                    format!("embedding component {} is not finite", pos),
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn mark_stored(&mut self, at: DateTime<Utc>) {
        self.stored_at = Some(at);
        self.updated_at = None;
    }

    pub(crate) fn mark_updated(&mut self, previous: &Document, at: DateTime<Utc>) {
        self.stored_at = previous.stored_at;
        self.updated_at = Some(at);
    }

    /// Latest timestamp on the record.
    pub(crate) fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.stored_at)
    }
}

impl Indexable for Document {
    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let doc = Document::with_id("doc-1", "hello")
            .with_metadata("department", "IT")
            .with_metadata("pages", 3)
            .with_embedding(vec![0.1, 0.2]);

        assert_eq!(doc.id.as_str(), "doc-1");
        assert_eq!(doc.metadata.len(), 2);
        assert_eq!(doc.embedding.as_deref(), Some(&[0.1f32, 0.2][..]));
        assert!(doc.stored_at().is_none());
    }

    #[test]
    fn test_generated_id() {
        let doc = Document::new("text");
        assert!(!doc.id.is_blank());
    }

    #[test]
    fn test_char_count_counts_chars_not_bytes() {
        let doc = Document::with_id("a", "àéí");
        assert_eq!(doc.char_count(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(Document::with_id("ok", "x").validate(None).is_ok());
        assert!(Document::with_id("  ", "x").validate(None).is_err());

        let doc = Document::with_id("e", "x").with_embedding(vec![1.0, 2.0]);
        assert!(doc.validate(Some(2)).is_ok());
        assert!(doc.validate(Some(3)).is_err());

        let nan = Document::with_id("n", "x").with_embedding(vec![f32::NAN]);
        let err = nan.validate(None).unwrap_err();
        assert!(matches!(err, DocStoreError::Validation { .. }));
    }

    #[test]
    fn test_validate_rejects_non_finite_metadata() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let doc = Document::with_id("m", "x")
                .with_metadata("department", "IT")
                .with_metadata("score", bad);
            let err = doc.validate(None).unwrap_err();
            assert!(err.to_string().contains("'score'"), "{}", err);
        }

        let edge = Document::with_id("m", "x")
            .with_metadata("max", f64::MAX)
            .with_metadata("tiny", f64::MIN_POSITIVE)
            .with_metadata("neg_zero", -0.0);
        assert!(edge.validate(None).is_ok());
    }
}
