//! Snapshot round-trips and recovery from damaged or stale files.

use forge_docstore::config::IndexConfig;
use forge_docstore::{
    Backend, DocStoreError, Document, DocumentStore, LoadStatus, MatchMode, MetadataFilter,
    MetadataIndex, SnapshotFormat, StoreConfig,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn corpus() -> Vec<Document> {
    vec![
        Document::with_id("a", "Server inventory")
            .with_metadata("department", "IT")
            .with_metadata("year", 2023)
            .with_metadata("tags", vec!["ops", "hardware"])
            .with_embedding(vec![0.1, 0.2, 0.3]),
        Document::with_id("b", "Service agreement")
            .with_metadata("department", "Legal")
            .with_metadata("year", 2024)
            .with_metadata("confidential", true),
        Document::with_id("c", "VPN guide")
            .with_metadata("department", "it")
            .with_metadata("score", 4.5),
    ]
}

fn index_file(dir: &Path, format: SnapshotFormat) -> std::path::PathBuf {
    dir.join(format!("metadata_index.{}", format.extension()))
}

fn documents_file(dir: &Path, format: SnapshotFormat) -> std::path::PathBuf {
    dir.join(format!("documents.{}", format.extension()))
}

fn assert_round_trip(format: SnapshotFormat) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path()).with_format(format);

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    store.persist().unwrap();

    assert!(documents_file(dir.path(), format).exists());
    assert!(index_file(dir.path(), format).exists());

    let reopened = DocumentStore::open(config).unwrap();
    assert_eq!(reopened.get_all(), store.get_all());
    assert_eq!(reopened.statistics(), store.statistics());

    let filter = MetadataFilter::new().eq("department", "IT");
    assert_eq!(
        reopened.search_by_metadata(&filter, MatchMode::All),
        store.search_by_metadata(&filter, MatchMode::All)
    );
    assert_eq!(
        reopened.index().value_counts("department"),
        store.index().value_counts("department")
    );
    assert_eq!(
        reopened.index().statistics().fields,
        store.index().statistics().fields
    );
    assert!(reopened.index().check_consistency().is_empty());
}

#[test]
fn test_binary_round_trip() {
    assert_round_trip(SnapshotFormat::Binary);
}

#[test]
fn test_json_round_trip() {
    assert_round_trip(SnapshotFormat::Json);
}

#[test]
fn test_open_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = DocumentStore::open(StoreConfig::snapshot(dir.path().join("never-written"))).unwrap();
    assert!(store.is_empty());
    assert!(store.index().is_empty());
}

#[test]
fn test_corrupt_index_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path());

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    store.persist().unwrap();

    fs::write(index_file(dir.path(), SnapshotFormat::Binary), b"not a snapshot").unwrap();

    let reopened = DocumentStore::open(config).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.index().len(), 3);

    let it = MetadataFilter::new().eq("department", "it");
    assert_eq!(reopened.search_by_metadata(&it, MatchMode::All).len(), 2);
}

#[test]
fn test_flipped_byte_in_index_is_detected() {
    let dir = TempDir::new().unwrap();
    let config = IndexConfig::default().with_backend(Backend::snapshot(dir.path()));

    let mut index = MetadataIndex::new(config.clone());
    let records: Vec<_> = corpus().into_iter().collect();
    index.index_records(&records, None);
    index.persist().unwrap();

    let path = index_file(dir.path(), SnapshotFormat::Binary);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let mut reloaded = MetadataIndex::new(config);
    assert_eq!(reloaded.load().unwrap(), LoadStatus::Corrupt);
    assert!(reloaded.is_empty());
}

#[test]
fn test_stale_index_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path());
    let index_path = index_file(dir.path(), SnapshotFormat::Binary);

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    store.persist().unwrap();
    let stale = fs::read(&index_path).unwrap();

    store
        .add(vec![Document::with_id("d", "Payroll").with_metadata("department", "HR")], true)
        .unwrap();
    store
        .add(vec![Document::with_id("a", "Moved").with_metadata("department", "HR")], true)
        .unwrap();
    store.persist().unwrap();

    // documents are current, index is from the earlier persist
    fs::write(&index_path, stale).unwrap();

    let reopened = DocumentStore::open(config).unwrap();
    let hr = MetadataFilter::new().eq("department", "hr");
    let found: Vec<String> = reopened
        .search_by_metadata(&hr, MatchMode::All)
        .into_iter()
        .map(|d| d.id.into())
        .collect();
    assert_eq!(found, vec!["a", "d"]);
    assert!(reopened.index().check_consistency().is_empty());
}

#[test]
fn test_corrupt_documents_fail_open() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path());

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    store.persist().unwrap();

    let path = documents_file(dir.path(), SnapshotFormat::Binary);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = DocumentStore::open(config).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {}", err);
}

#[test]
fn test_auto_persist_tracks_mutations() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path()).with_auto_persist(true);

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    assert_eq!(DocumentStore::open(config.clone()).unwrap().len(), 3);

    store.delete("b").unwrap();
    let reopened = DocumentStore::open(config).unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.get("b").is_none());
    assert!(!reopened.index().contains("b"));
}

#[test]
fn test_timestamps_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path()).with_format(SnapshotFormat::Json);

    let store = DocumentStore::new(config.clone());
    store.add(corpus(), true).unwrap();
    store
        .add(vec![Document::with_id("a", "Server inventory v2")], true)
        .unwrap();
    store.persist().unwrap();

    let reopened = DocumentStore::open(config).unwrap();
    let a = reopened.get("a").unwrap();
    assert!(a.stored_at().is_some());
    assert!(a.updated_at().unwrap() > a.stored_at().unwrap());
    assert_eq!(a.text, "Server inventory v2");
    assert!(a.metadata.is_empty());
}

fn edge_corpus() -> Vec<Document> {
    vec![
        Document::with_id("floats", "")
            .with_metadata("max", f64::MAX)
            .with_metadata("min", f64::MIN)
            .with_metadata("tiny", f64::MIN_POSITIVE)
            .with_metadata("neg_zero", -0.0)
            .with_metadata("third", 1.0 / 3.0)
            .with_embedding(vec![f32::MAX, -0.0, f32::MIN_POSITIVE]),
        Document::with_id("ints", "")
            .with_metadata("big", i64::MAX)
            .with_metadata("small", i64::MIN)
            .with_metadata("flag", false),
        Document::with_id("texts", "Núria, Ñandú, 東京 🚀")
            .with_metadata("empty", "")
            .with_metadata("city", "  Lleida ÀÉÍ ")
            .with_metadata("emoji", "🚀")
            .with_metadata("no_tags", Vec::<String>::new())
            .with_metadata("tags", vec!["zeta", "Àlfa", ""]),
    ]
}

fn assert_edge_round_trip(format: SnapshotFormat) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path()).with_format(format);

    let store = DocumentStore::new(config.clone());
    let report = store.add(edge_corpus(), true).unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    store.persist().unwrap();

    let reopened = DocumentStore::open(config).unwrap();
    assert_eq!(reopened.get_all(), store.get_all());

    // an index that had to be rebuilt would carry a fresh timestamp
    assert_eq!(
        reopened.index().statistics().last_updated,
        store.index().statistics().last_updated
    );
    assert!(reopened.index().check_consistency().is_empty());

    for doc in edge_corpus() {
        for (field, value) in &doc.metadata {
            let filter = MetadataFilter::new().eq(field.as_str(), value.clone());
            let found = reopened.search_by_metadata(&filter, MatchMode::All);
            assert!(
                found.iter().any(|d| d.id == doc.id),
                "{}={} not found after reopen",
                field,
                value
            );
        }
    }
}

#[test]
fn test_binary_round_trip_edge_values() {
    assert_edge_round_trip(SnapshotFormat::Binary);
}

#[test]
fn test_json_round_trip_edge_values() {
    assert_edge_round_trip(SnapshotFormat::Json);
}

#[test]
fn test_non_finite_metadata_rejected_before_json_persist() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::snapshot(dir.path()).with_format(SnapshotFormat::Json);

    let store = DocumentStore::new(config.clone());
    let report = store
        .add(
            vec![
                Document::with_id("nan", "x").with_metadata("score", f64::NAN),
                Document::with_id("inf", "x").with_metadata("score", f64::INFINITY),
                Document::with_id("ok", "x").with_metadata("score", 0.5),
            ],
            true,
        )
        .unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(report.errors.len(), 2);
    assert!(report
        .errors
        .iter()
        .all(|e| matches!(e.error, DocStoreError::Validation { .. })));
    assert!(store.index().check_consistency().is_empty());

    store.persist().unwrap();
    let reopened = DocumentStore::open(config).unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(reopened.get("ok").is_some());
}

#[test]
fn test_memory_backend_never_writes() {
    let store = DocumentStore::new(StoreConfig::in_memory().with_auto_persist(true));
    store.add(corpus(), true).unwrap();
    store.persist().unwrap();
    assert_eq!(store.len(), 3);
}
