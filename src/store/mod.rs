//! Durable document store driving the metadata index.
//!
//! The store owns record identity. Every mutation updates the
//! [`MetadataIndex`] inside the same write lock, so readers never observe a
//! record that is stored but not indexed (or the reverse).
//!
//! # Example
//!
//! ```
//! use forge_docstore::config::StoreConfig;
//! use forge_docstore::metadata::{MatchMode, MetadataFilter};
//! use forge_docstore::store::{Document, DocumentStore};
//!
//! let store = DocumentStore::new(StoreConfig::in_memory());
//! let report = store
//!     .add(
//!         vec![
//!             Document::with_id("a", "Quarterly budget").with_metadata("department", "IT"),
//!             Document::with_id("b", "Contract review").with_metadata("department", "Legal"),
//!         ],
//!         true,
//!     )
//!     .unwrap();
//! assert_eq!(report.added, 2);
//!
//! let it = store.search_by_metadata(&MetadataFilter::new().eq("department", "it"), MatchMode::All);
//! assert_eq!(it.len(), 1);
//! ```

mod document;

pub use document::Document;

use crate::config::StoreConfig;
use crate::constants::stats::{FILE_TYPE_FIELD, LANGUAGE_FIELD, UNKNOWN_BUCKET};
use crate::error::{DocStoreError, Result};
use crate::hybrid::{hybrid_search, Candidate};
use crate::metadata::{LoadStatus, MatchMode, MetadataFilter, MetadataIndex};
use crate::persistence::{read_snapshot, write_snapshot, SnapshotKind};
use crate::types::{DocumentId, Metadata};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap};

/// Per-record failure inside an [`add`](DocumentStore::add) batch.
#[derive(Debug)]
pub struct AddError {
    /// Id of the rejected record.
    pub id: DocumentId,
    /// Why it was rejected.
    pub error: DocStoreError,
}

/// Outcome of an [`add`](DocumentStore::add) batch.
#[derive(Debug, Default)]
pub struct AddReport {
    /// Records that were new.
    pub added: usize,
    /// Existing records that were replaced.
    pub updated: usize,
    /// Existing records left untouched.
    pub skipped: usize,
    /// Records that failed; the rest of the batch still went through.
    pub errors: Vec<AddError>,
}

impl AddReport {
    /// True if no record failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate view of the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Number of live documents.
    pub total_documents: usize,
    /// Sum of text lengths in characters.
    pub total_chars: usize,
    /// Integer mean of text lengths; 0 for an empty store.
    pub avg_chars: usize,
    /// Document count per `file_type` value.
    pub by_file_type: BTreeMap<String, usize>,
    /// Document count per `language` value.
    pub by_language: BTreeMap<String, usize>,
}

impl StoreStatistics {
    /// Create a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "StoreStatistics:\n  \
             Documents: {}\n  \
             Characters: {} (avg {})\n  \
             File types: {:?}\n  \
             Languages: {:?}",
            self.total_documents,
            self.total_chars,
            self.avg_chars,
            self.by_file_type,
            self.by_language
        )
    }
}

enum AddOutcome {
    Added,
    Updated,
    Skipped,
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    document: Document,
}

#[derive(Debug)]
struct StoreState {
    documents: HashMap<DocumentId, Slot>,
    next_seq: u64,
    index: MetadataIndex,
}

impl StoreState {
    fn upsert(
        &mut self,
        mut doc: Document,
        update_existing: bool,
        embedding_dimension: Option<usize>,
    ) -> Result<AddOutcome> {
        doc.validate(embedding_dimension)?;

        match self.documents.get_mut(&doc.id) {
            Some(_) if !update_existing => Ok(AddOutcome::Skipped),
            Some(slot) => {
                let at = strictly_after(Utc::now(), slot.document.last_modified());
                doc.mark_updated(&slot.document, at);
                self.index.index_record(&doc, None);
                slot.document = doc;
                Ok(AddOutcome::Updated)
            }
            None => {
                doc.mark_stored(Utc::now());
                self.index.index_record(&doc, None);
                let seq = self.next_seq;
                self.next_seq += 1;
                self.documents.insert(doc.id.clone(), Slot { seq, document: doc });
                Ok(AddOutcome::Added)
            }
        }
    }

    fn ordered(&self) -> Vec<&Document> {
        let mut slots: Vec<&Slot> = self.documents.values().collect();
        slots.sort_unstable_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| &slot.document).collect()
    }

    /// True if the index side table mirrors the canonical records exactly.
    fn index_matches(&self) -> bool {
        self.index.len() == self.documents.len()
            && self.documents.iter().all(|(id, slot)| {
                self.index.get_metadata(id.as_str()) == Some(&slot.document.metadata)
            })
            && self.index.check_consistency().is_empty()
    }
}

/// Clock readings can repeat; keep update stamps strictly increasing.
fn strictly_after(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::nanoseconds(1),
        _ => now,
    }
}

/// Canonical document storage with a synchronized metadata index.
///
/// All methods take `&self`; a single reader-writer lock covers the records
/// and the index, so the store can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct DocumentStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl DocumentStore {
    /// Create an empty store. Nothing is read from disk.
    pub fn new(config: StoreConfig) -> Self {
        let index = MetadataIndex::new(config.index_config());
        Self {
            config,
            state: RwLock::new(StoreState {
                documents: HashMap::new(),
                next_seq: 0,
                index,
            }),
        }
    }

    /// Open a store, restoring records and index from their snapshots.
    ///
    /// A missing document snapshot gives an empty store. A corrupt one is
    /// returned as an error: the records have no other source. The index is
    /// rebuilt from the records whenever its snapshot is missing, corrupt, or
    /// out of step with them.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self::new(config);

        if let Some((path, format)) = store.config.documents_file() {
            let loaded: Option<Vec<Document>> =
                read_snapshot(&path, SnapshotKind::Documents, format)?;

            let mut state = store.state.write();
            for document in loaded.unwrap_or_default() {
                if state.documents.contains_key(&document.id) {
                    return Err(DocStoreError::corrupt_snapshot(format!(
                        "duplicate document id '{}'",
                        document.id
                    )));
                }
                let seq = state.next_seq;
                state.next_seq += 1;
                state.documents.insert(document.id.clone(), Slot { seq, document });
            }

            let status = state.index.load()?;
            if status != LoadStatus::Loaded || !state.index_matches() {
                tracing::warn!(
                    target: "forge_docstore::store",
                    status = ?status,
                    documents = state.documents.len(),
                    "Metadata index out of step with documents, rebuilding"
                );
                let StoreState { documents, index, .. } = &mut *state;
                index.rebuild(documents.values().map(|slot| &slot.document));
            }

            tracing::info!(
                target: "forge_docstore::store",
                path = %path.display(),
                documents = state.documents.len(),
                "Document store opened"
            );
        }

        Ok(store)
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Add a batch of documents.
    ///
    /// New ids are stored and indexed. Existing ids are replaced (and
    /// re-indexed) when `update_existing` is true, skipped otherwise. A record
    /// that fails validation is reported in [`AddReport::errors`] without
    /// affecting the rest of the batch.
    ///
    /// # Errors
    /// Only fails when auto-persist is enabled and the snapshot write fails.
    pub fn add(
        &self,
        documents: impl IntoIterator<Item = Document>,
        update_existing: bool,
    ) -> Result<AddReport> {
        let mut report = AddReport::default();
        let mut state = self.state.write();

        for doc in documents {
            let id = doc.id.clone();
            match state.upsert(doc, update_existing, self.config.embedding_dimension) {
                Ok(AddOutcome::Added) => {
                    report.added += 1;
                    tracing::debug!(target: "forge_docstore::store", id = %id, "Document added");
                }
                Ok(AddOutcome::Updated) => {
                    report.updated += 1;
                    tracing::debug!(target: "forge_docstore::store", id = %id, "Document updated");
                }
                Ok(AddOutcome::Skipped) => {
                    report.skipped += 1;
                    tracing::debug!(target: "forge_docstore::store", id = %id, "Document skipped (exists)");
                }
                Err(error) => {
                    tracing::error!(
                        target: "forge_docstore::store",
                        id = %id,
                        error = %error,
                        "Failed to store document"
                    );
                    report.errors.push(AddError { id, error });
                }
            }
        }

        tracing::info!(
            target: "forge_docstore::store",
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Documents stored"
        );

        if self.config.auto_persist {
            self.persist_state(&state)?;
        }

        Ok(report)
    }

    /// Fetch a document by id.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.state
            .read()
            .documents
            .get(id)
            .map(|slot| slot.document.clone())
    }

    /// All live documents in insertion order.
    pub fn get_all(&self) -> Vec<Document> {
        self.state.read().ordered().into_iter().cloned().collect()
    }

    /// True if `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().documents.contains_key(id)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    /// True if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.state.read().documents.is_empty()
    }

    /// Remove a document and its index entry.
    ///
    /// Returns `Ok(false)` when the id is not stored.
    ///
    /// # Errors
    /// Only fails when auto-persist is enabled and the snapshot write fails.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write();

        if state.documents.remove(id).is_none() {
            tracing::warn!(target: "forge_docstore::store", id = id, "Delete of unknown document");
            return Ok(false);
        }
        state.index.delete_record(id);

        tracing::debug!(target: "forge_docstore::store", id = id, "Document deleted");

        if self.config.auto_persist {
            self.persist_state(&state)?;
        }
        Ok(true)
    }

    /// Documents matching `filter`, in insertion order.
    pub fn search_by_metadata(&self, filter: &MetadataFilter, mode: MatchMode) -> Vec<Document> {
        let state = self.state.read();
        let ids = state.index.search(filter, mode);

        let mut slots: Vec<&Slot> = ids
            .iter()
            .filter_map(|id| state.documents.get(id))
            .collect();
        slots.sort_unstable_by_key(|slot| slot.seq);

        let documents: Vec<Document> = slots.into_iter().map(|slot| slot.document.clone()).collect();

        tracing::debug!(
            target: "forge_docstore::store",
            matches = documents.len(),
            "Metadata search"
        );
        documents
    }

    /// Filter an externally ranked candidate list by metadata, keeping rank order.
    pub fn hybrid_search<T: Candidate + Clone>(&self, ranked: &[T], filter: &MetadataFilter) -> Vec<T> {
        let state = self.state.read();
        hybrid_search(ranked, &state.index, filter)
    }

    /// Read access to the metadata index.
    ///
    /// Writers are blocked while the guard is held.
    pub fn index(&self) -> MappedRwLockReadGuard<'_, MetadataIndex> {
        RwLockReadGuard::map(self.state.read(), |state| &state.index)
    }

    /// Discard the index and rebuild it from the stored documents.
    pub fn rebuild_index(&self) {
        let mut state = self.state.write();
        let StoreState { documents, index, .. } = &mut *state;
        index.rebuild(documents.values().map(|slot| &slot.document));
    }

    /// Aggregate statistics over the live documents.
    ///
    /// Metadata is read from the index side table; documents without a
    /// `file_type` or `language` field are counted under `unknown`.
    pub fn statistics(&self) -> StoreStatistics {
        let state = self.state.read();
        let mut stats = StoreStatistics {
            total_documents: state.documents.len(),
            ..StoreStatistics::default()
        };

        for (id, slot) in &state.documents {
            stats.total_chars += slot.document.char_count();

            let metadata: &Metadata = state
                .index
                .get_metadata(id.as_str())
                .unwrap_or(&slot.document.metadata);
            *stats.by_file_type.entry(bucket_key(metadata, FILE_TYPE_FIELD)).or_default() += 1;
            *stats.by_language.entry(bucket_key(metadata, LANGUAGE_FIELD)).or_default() += 1;
        }

        if stats.total_documents > 0 {
            stats.avg_chars = stats.total_chars / stats.total_documents;
        }
        stats
    }

    /// Write the document snapshot, then the index snapshot.
    ///
    /// Records go first so a crash between the two writes can only leave a
    /// stale index, which [`open`](Self::open) rebuilds.
    pub fn persist(&self) -> Result<()> {
        let state = self.state.read();
        self.persist_state(&state)
    }

    fn persist_state(&self, state: &StoreState) -> Result<()> {
        let Some((path, format)) = self.config.documents_file() else {
            return Ok(());
        };

        let documents = state.ordered();
        write_snapshot(&path, SnapshotKind::Documents, format, &documents)?;
        state.index.persist()?;

        tracing::info!(
            target: "forge_docstore::store",
            path = %path.display(),
            documents = documents.len(),
            "Document store persisted"
        );
        Ok(())
    }
}

fn bucket_key(metadata: &Metadata, field: &str) -> String {
    metadata
        .get(field)
        .map(|value| value.to_string())
        .unwrap_or_else(|| UNKNOWN_BUCKET.to_string())
}
