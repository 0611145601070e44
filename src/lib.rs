//! forge-docstore: a document store with a metadata inverted index.
//!
//! Documents carry text, open-schema metadata and an optional embedding.
//! The store keeps the canonical records; a derived inverted index maps
//! `field -> normalized value -> ids` for exact-match filtering, and a
//! hybrid filter narrows externally ranked candidates by metadata without
//! reordering them.
//!
//! # Features
//!
//! - **Normalized matching**: text values are trimmed and case-folded on
//!   insert and on lookup
//! - **AND / OR filters**: every clause or any clause must match
//! - **Hybrid filtering**: rank order from an external similarity search is
//!   preserved
//! - **Snapshots**: checksummed binary or JSON files, written atomically;
//!   a missing or damaged index is rebuilt from the records
//! - **Thread-safe**: one reader-writer lock covers records and index
//!
//! # Example
//!
//! ```
//! use forge_docstore::{Document, DocumentStore, MatchMode, MetadataFilter, StoreConfig};
//!
//! let store = DocumentStore::new(StoreConfig::in_memory());
//! store
//!     .add(
//!         vec![
//!             Document::with_id("c1", "Budget 2024").with_metadata("category", "Finance"),
//!             Document::with_id("c2", "NDA template").with_metadata("category", "Legal"),
//!             Document::with_id("c3", "Audit notes").with_metadata("category", "finance "),
//!         ],
//!         true,
//!     )
//!     .unwrap();
//!
//! let filter = MetadataFilter::new().eq("category", "FINANCE");
//! assert_eq!(store.search_by_metadata(&filter, MatchMode::All).len(), 2);
//!
//! let ranked = vec!["c3", "c2", "c1"];
//! assert_eq!(store.hybrid_search(&ranked, &filter), vec!["c3", "c1"]);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod hybrid;
pub mod metadata;
pub mod persistence;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{Backend, IndexConfig, StoreConfig};
pub use error::{DocStoreError, Result};
pub use hybrid::{hybrid_search, Candidate, ScoredCandidate};
pub use metadata::{
    normalize, IndexStatistics, LoadStatus, MatchMode, MetadataFilter, MetadataIndex, MetadataValue,
};
pub use persistence::SnapshotFormat;
pub use store::{AddError, AddReport, Document, DocumentStore, StoreStatistics};
pub use types::{DocumentId, Metadata};
