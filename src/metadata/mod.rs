//! Metadata values, normalization, filters and the inverted index.
//!
//! Every metadata value passes through [`normalize`] on its way into the
//! index and on every lookup, so queries hit exactly the buckets that
//! earlier inserts created.
//!
//! # Example
//!
//! ```
//! use forge_docstore::config::IndexConfig;
//! use forge_docstore::metadata::{MatchMode, MetadataFilter, MetadataIndex};
//! use forge_docstore::{DocumentId, Metadata};
//!
//! let mut index = MetadataIndex::new(IndexConfig::in_memory());
//!
//! let mut metadata = Metadata::new();
//! metadata.insert("department".into(), "IT".into());
//! index.index_records(&[(DocumentId::new("doc-1"), metadata)], None);
//!
//! let filter = MetadataFilter::new().eq("department", " it ");
//! let matching = index.search(&filter, MatchMode::All);
//! assert!(matching.contains("doc-1"));
//! ```

mod filter;
mod index;
mod normalize;
mod value;

pub use filter::{MatchMode, MetadataFilter};
pub use index::{FieldStatistics, IndexStatistics, Indexable, LoadStatus, MetadataIndex};
pub use normalize::normalize;
pub use value::MetadataValue;
