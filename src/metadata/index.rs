//! Inverted index over document metadata.
//!
//! Structure: `field -> normalized value -> {document ids}`, plus a side
//! table holding the full metadata of every indexed id. The index is a
//! derived projection of the document store and can always be rebuilt from
//! it with [`MetadataIndex::rebuild`].

use super::filter::{MatchMode, MetadataFilter};
use super::normalize::normalize;
use super::value::MetadataValue;
use crate::config::IndexConfig;
use crate::error::{DocStoreError, Result};
use crate::persistence::{read_snapshot, write_snapshot, SnapshotKind};
use crate::types::{DocumentId, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Anything the index can ingest: an id plus its metadata.
pub trait Indexable {
    /// Identifier the record is indexed under.
    fn id(&self) -> &DocumentId;

    /// Metadata to index.
    fn metadata(&self) -> &Metadata;
}

impl Indexable for (DocumentId, Metadata) {
    fn id(&self) -> &DocumentId {
        &self.0
    }

    fn metadata(&self) -> &Metadata {
        &self.1
    }
}

/// Outcome of [`MetadataIndex::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Snapshot found and restored.
    Loaded,
    /// No snapshot exists; the index is empty.
    Missing,
    /// Snapshot exists but was unreadable or inconsistent; the index is empty.
    Corrupt,
}

/// Side-table entry for one id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct IndexedEntry {
    metadata: Metadata,
    /// Fields that received bucket memberships for this id.
    fields: BTreeSet<String>,
}

type Buckets = HashMap<MetadataValue, HashSet<DocumentId>>;

/// Per-field detail in [`IndexStatistics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldStatistics {
    /// Number of distinct normalized values.
    pub unique_values: usize,
    /// Sum of bucket sizes across all values.
    pub total_memberships: usize,
}

/// Aggregate view of the index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexStatistics {
    /// Number of ids in the side table.
    pub total_records: usize,
    /// Fields with at least one bucket, sorted.
    pub indexed_fields: Vec<String>,
    /// Time of the last mutation.
    pub last_updated: Option<DateTime<Utc>>,
    /// Per-field bucket detail.
    pub fields: BTreeMap<String, FieldStatistics>,
}

impl IndexStatistics {
    /// Create a human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "IndexStatistics:\n  Records: {}\n  Fields: {}\n  Last updated: {}",
            self.total_records,
            self.indexed_fields.len(),
            self.last_updated
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
        for (field, detail) in &self.fields {
            out.push_str(&format!(
                "\n  {}: {} values, {} memberships",
                field, detail.unique_values, detail.total_memberships
            ));
        }
        out
    }
}

/// One bucket as stored on disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct BucketSnapshot {
    value: MetadataValue,
    ids: Vec<DocumentId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StatsSnapshot {
    total_records: usize,
    indexed_fields: Vec<String>,
    last_updated: Option<DateTime<Utc>>,
}

/// Serialized form: buckets, side table, stats.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    buckets: BTreeMap<String, Vec<BucketSnapshot>>,
    records: HashMap<DocumentId, IndexedEntry>,
    stats: StatsSnapshot,
}

/// Inverted index from normalized metadata values to document ids.
///
/// Updating an id is always delete-then-insert: its previous bucket
/// memberships are retired before the new metadata is indexed, so values
/// that disappear from a record never leave stale memberships behind.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    config: IndexConfig,
    buckets: HashMap<String, Buckets>,
    records: HashMap<DocumentId, IndexedEntry>,
    last_updated: Option<DateTime<Utc>>,
}

impl MetadataIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Create an index and restore its snapshot if one exists.
    ///
    /// A missing or corrupt snapshot yields an empty index; see [`load`](Self::load).
    pub fn open(config: IndexConfig) -> Result<Self> {
        let mut index = Self::new(config);
        index.load()?;
        Ok(index)
    }

    /// The configuration this index was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if `id` is in the side table.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Iterate over all indexed ids.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.records.keys()
    }

    /// Index a batch of records.
    ///
    /// `fields` restricts which metadata fields get buckets; `None` falls back
    /// to the configured allow-list, and then to every field present. The full
    /// metadata is kept in the side table regardless.
    pub fn index_records<'a, R, I>(&mut self, records: I, fields: Option<&[&str]>)
    where
        R: Indexable + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut count = 0usize;
        for record in records {
            self.index_record(record, fields);
            count += 1;
        }

        if count == 0 {
            tracing::warn!(target: "forge_docstore::index", "No records to index");
            return;
        }

        tracing::info!(
            target: "forge_docstore::index",
            batch = count,
            total_records = self.records.len(),
            indexed_fields = self.buckets.len(),
            "Metadata indexed"
        );
    }

    /// Index (or re-index) a single record.
    ///
    /// NaN and infinite floats never get a bucket; they stay in the side
    /// table only.
    pub fn index_record<R: Indexable + ?Sized>(&mut self, record: &R, fields: Option<&[&str]>) {
        let id = record.id();
        let metadata = record.metadata();

        self.remove_memberships(id.as_str());

        let mut indexed = BTreeSet::new();
        for (field, value) in metadata {
            if !self.should_index(field, fields) {
                continue;
            }
            if !value.is_finite() {
                tracing::warn!(
                    target: "forge_docstore::index",
                    id = %id,
                    field = field.as_str(),
                    "Non-finite value not indexed"
                );
                continue;
            }
            self.buckets
                .entry(field.clone())
                .or_default()
                .entry(normalize(value))
                .or_default()
                .insert(id.clone());
            indexed.insert(field.clone());
        }

        self.records.insert(
            id.clone(),
            IndexedEntry {
                metadata: metadata.clone(),
                fields: indexed,
            },
        );
        self.touch();
    }

    fn should_index(&self, field: &str, fields: Option<&[&str]>) -> bool {
        match (fields, &self.config.fields) {
            (Some(allowed), _) => allowed.contains(&field),
            (None, Some(allowed)) => allowed.iter().any(|f| f == field),
            (None, None) => true,
        }
    }

    /// Find ids whose metadata satisfies `filter`.
    ///
    /// Each clause resolves to one bucket (empty when the field is not
    /// indexed or the value is absent). Buckets are intersected for
    /// [`MatchMode::All`] and unioned for [`MatchMode::Any`]. An empty filter
    /// returns every indexed id.
    pub fn search(&self, filter: &MetadataFilter, mode: MatchMode) -> HashSet<DocumentId> {
        if filter.is_empty() {
            return self.records.keys().cloned().collect();
        }

        let mut matched: Vec<Option<&HashSet<DocumentId>>> = Vec::with_capacity(filter.len());
        for (field, value) in filter.iter() {
            match self.buckets.get(field) {
                Some(values) => matched.push(values.get(&normalize(value))),
                None => {
                    tracing::warn!(
                        target: "forge_docstore::index",
                        field = field,
                        "Field not indexed"
                    );
                    matched.push(None);
                }
            }
        }

        let result: HashSet<DocumentId> = match mode {
            MatchMode::All => match matched.into_iter().collect::<Option<Vec<_>>>() {
                Some(mut sets) => {
                    // Probe from the smallest bucket
                    sets.sort_by_key(|s| s.len());
                    match sets.split_first() {
                        Some((first, rest)) => first
                            .iter()
                            .filter(|id| rest.iter().all(|s| s.contains(*id)))
                            .cloned()
                            .collect(),
                        None => HashSet::new(),
                    }
                }
                None => HashSet::new(),
            },
            MatchMode::Any => matched.into_iter().flatten().flatten().cloned().collect(),
        };

        tracing::debug!(
            target: "forge_docstore::index",
            clauses = filter.len(),
            mode = ?mode,
            matches = result.len(),
            "Metadata search"
        );

        result
    }

    /// Ids whose value for `field` lies within `[min, max]`.
    ///
    /// Bounds are inclusive and normalized like stored values; `None` leaves
    /// that side open. Buckets whose value cannot be ordered against a bound
    /// (e.g. text against a number) are skipped. Result is sorted by id.
    pub fn range_search(
        &self,
        field: &str,
        min: Option<&MetadataValue>,
        max: Option<&MetadataValue>,
    ) -> Vec<DocumentId> {
        let Some(values) = self.buckets.get(field) else {
            tracing::warn!(target: "forge_docstore::index", field = field, "Field not indexed");
            return Vec::new();
        };

        let min = min.map(normalize);
        let max = max.map(normalize);

        let mut ids: Vec<DocumentId> = values
            .iter()
            .filter(|(value, _)| {
                let above_min = min.as_ref().map_or(true, |bound| {
                    matches!(value.partial_cmp_value(bound), Some(o) if o.is_ge())
                });
                let below_max = max.as_ref().map_or(true, |bound| {
                    matches!(value.partial_cmp_value(bound), Some(o) if o.is_le())
                });
                above_min && below_max
            })
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect();

        ids.sort_unstable();
        ids
    }

    /// Distinct normalized values seen for `field`.
    pub fn unique_values(&self, field: &str) -> Vec<MetadataValue> {
        self.buckets
            .get(field)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Bucket size per normalized value of `field`.
    pub fn value_counts(&self, field: &str) -> HashMap<MetadataValue, usize> {
        self.buckets
            .get(field)
            .map(|values| {
                values
                    .iter()
                    .map(|(value, ids)| (value.clone(), ids.len()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Full metadata stored for `id`.
    pub fn get_metadata(&self, id: &str) -> Option<&Metadata> {
        self.records.get(id).map(|entry| &entry.metadata)
    }

    /// Remove `id` from every bucket and from the side table.
    ///
    /// Returns `false` if the id was not indexed.
    pub fn delete_record(&mut self, id: &str) -> bool {
        let removed = self.remove_memberships(id);
        if removed {
            self.touch();
        }
        removed
    }

    fn remove_memberships(&mut self, id: &str) -> bool {
        let Some(entry) = self.records.remove(id) else {
            return false;
        };

        for field in &entry.fields {
            let Some(value) = entry.metadata.get(field) else {
                continue;
            };
            let Some(values) = self.buckets.get_mut(field) else {
                continue;
            };
            let key = normalize(value);
            if let Some(ids) = values.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    values.remove(&key);
                }
            }
            if values.is_empty() {
                self.buckets.remove(field);
            }
        }

        true
    }

    /// Drop all buckets and the side table.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.records.clear();
        self.touch();

        tracing::info!(target: "forge_docstore::index", "Metadata index cleared");
    }

    /// Clear and re-index from canonical records.
    pub fn rebuild<'a, R, I>(&mut self, records: I)
    where
        R: Indexable + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        self.buckets.clear();
        self.records.clear();
        for record in records {
            self.index_record(record, None);
        }
        self.touch();

        tracing::info!(
            target: "forge_docstore::index",
            total_records = self.records.len(),
            "Metadata index rebuilt"
        );
    }

    /// Aggregate statistics.
    pub fn statistics(&self) -> IndexStatistics {
        let fields: BTreeMap<String, FieldStatistics> = self
            .buckets
            .iter()
            .map(|(field, values)| {
                (
                    field.clone(),
                    FieldStatistics {
                        unique_values: values.len(),
                        total_memberships: values.values().map(HashSet::len).sum(),
                    },
                )
            })
            .collect();

        IndexStatistics {
            total_records: self.records.len(),
            indexed_fields: fields.keys().cloned().collect(),
            last_updated: self.last_updated,
            fields,
        }
    }

    /// Check bucket membership against the side table.
    ///
    /// Returns one message per violation; empty means consistent.
    pub fn check_consistency(&self) -> Vec<String> {
        check_buckets(&self.buckets, &self.records)
    }

    /// Write the index snapshot. No-op on the memory backend.
    pub fn persist(&self) -> Result<()> {
        let Some((path, format)) = self.config.snapshot_file() else {
            return Ok(());
        };

        write_snapshot(&path, SnapshotKind::MetadataIndex, format, &self.to_snapshot())?;

        tracing::info!(
            target: "forge_docstore::index",
            path = %path.display(),
            total_records = self.records.len(),
            "Metadata index persisted"
        );
        Ok(())
    }

    /// Replace the in-memory state with the snapshot on disk.
    ///
    /// Missing and corrupt snapshots leave the index empty and are reported
    /// through [`LoadStatus`]; only storage I/O failures are errors, and
    /// those leave the current state untouched.
    pub fn load(&mut self) -> Result<LoadStatus> {
        let Some((path, format)) = self.config.snapshot_file() else {
            return Ok(LoadStatus::Missing);
        };

        let snapshot = match read_snapshot::<IndexSnapshot>(&path, SnapshotKind::MetadataIndex, format)
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.reset();
                tracing::debug!(
                    target: "forge_docstore::index",
                    path = %path.display(),
                    "No metadata index snapshot"
                );
                return Ok(LoadStatus::Missing);
            }
            Err(e) if e.is_corruption() => {
                self.reset();
                tracing::warn!(
                    target: "forge_docstore::index",
                    path = %path.display(),
                    error = %e,
                    "Unreadable metadata index snapshot, starting empty"
                );
                return Ok(LoadStatus::Corrupt);
            }
            Err(e) => return Err(e),
        };

        match self.restore(snapshot) {
            Ok(()) => {
                tracing::info!(
                    target: "forge_docstore::index",
                    path = %path.display(),
                    total_records = self.records.len(),
                    "Metadata index loaded"
                );
                Ok(LoadStatus::Loaded)
            }
            Err(e) => {
                self.reset();
                tracing::warn!(
                    target: "forge_docstore::index",
                    path = %path.display(),
                    error = %e,
                    "Inconsistent metadata index snapshot, starting empty"
                );
                Ok(LoadStatus::Corrupt)
            }
        }
    }

    fn to_snapshot(&self) -> IndexSnapshot {
        let buckets = self
            .buckets
            .iter()
            .map(|(field, values)| {
                let buckets = values
                    .iter()
                    .map(|(value, ids)| {
                        let mut ids: Vec<DocumentId> = ids.iter().cloned().collect();
                        ids.sort_unstable();
                        BucketSnapshot {
                            value: value.clone(),
                            ids,
                        }
                    })
                    .collect();
                (field.clone(), buckets)
            })
            .collect();

        let stats = self.statistics();
        IndexSnapshot {
            buckets,
            records: self.records.clone(),
            stats: StatsSnapshot {
                total_records: stats.total_records,
                indexed_fields: stats.indexed_fields,
                last_updated: self.last_updated,
            },
        }
    }

    fn restore(&mut self, snapshot: IndexSnapshot) -> Result<()> {
        let mut buckets: HashMap<String, Buckets> = HashMap::with_capacity(snapshot.buckets.len());
        for (field, values) in snapshot.buckets {
            let field_buckets = buckets.entry(field).or_default();
            for bucket in values {
                field_buckets
                    .entry(bucket.value)
                    .or_default()
                    .extend(bucket.ids);
            }
        }

        if snapshot.stats.total_records != snapshot.records.len() {
            return Err(DocStoreError::corrupt_snapshot(format!(
                "stats report {} records, side table holds {}",
                snapshot.stats.total_records,
                snapshot.records.len()
            )));
        }

        let stored_fields: BTreeSet<&String> = snapshot.stats.indexed_fields.iter().collect();
        let bucket_fields: BTreeSet<&String> = buckets.keys().collect();
        if stored_fields != bucket_fields {
            return Err(DocStoreError::corrupt_snapshot(
                "indexed field list does not match buckets",
            ));
        }

        let violations = check_buckets(&buckets, &snapshot.records);
        if let Some(first) = violations.first() {
            return Err(DocStoreError::corrupt_snapshot(format!(
                "{} bucket violations, first: {}",
                violations.len(),
                first
            )));
        }

        self.buckets = buckets;
        self.records = snapshot.records;
        self.last_updated = snapshot.stats.last_updated;
        Ok(())
    }

    fn reset(&mut self) {
        self.buckets.clear();
        self.records.clear();
        self.last_updated = None;
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

fn check_buckets(
    buckets: &HashMap<String, Buckets>,
    records: &HashMap<DocumentId, IndexedEntry>,
) -> Vec<String> {
    let mut violations = Vec::new();

    // Every indexed (field, value) of a record must be present in its bucket
    for (id, entry) in records {
        for field in &entry.fields {
            let Some(value) = entry.metadata.get(field) else {
                violations.push(format!("{}: indexed field '{}' missing from metadata", id, field));
                continue;
            };
            let present = buckets
                .get(field)
                .and_then(|values| values.get(&normalize(value)))
                .is_some_and(|ids| ids.contains(id));
            if !present {
                violations.push(format!("{}: not in bucket {}={}", id, field, value));
            }
        }
    }

    // Every membership must be backed by a record with that normalized value
    for (field, values) in buckets {
        for (value, ids) in values {
            if ids.is_empty() {
                violations.push(format!("empty bucket {}={}", field, value));
            }
            for id in ids {
                let backed = records.get(id).is_some_and(|entry| {
                    entry.fields.contains(field)
                        && entry
                            .metadata
                            .get(field)
                            .is_some_and(|v| normalize(v) == *value)
                });
                if !backed {
                    violations.push(format!("{}: stale membership in {}={}", id, field, value));
                }
            }
        }
    }

    violations
}
