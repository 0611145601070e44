//! Canonicalization of metadata values into index keys.
//!
//! The index applies [`normalize`] on every write and every lookup, so a
//! query always lands in the bucket an earlier insert created.

use super::value::MetadataValue;

/// Map a metadata value to its canonical, comparable key.
///
/// - text: surrounding whitespace trimmed, lowercased
/// - list: items sorted, so `["b", "a"]` and `["a", "b"]` share a key
/// - integer, float, boolean: unchanged
///
/// Total and idempotent: `normalize(&normalize(v)) == normalize(v)`.
pub fn normalize(value: &MetadataValue) -> MetadataValue {
    match value {
        MetadataValue::Text(s) => MetadataValue::Text(s.trim().to_lowercase()),
        MetadataValue::List(items) => {
            let mut sorted = items.clone();
            sorted.sort_unstable();
            MetadataValue::List(sorted)
        }
        other => other.clone(),
    }
}
