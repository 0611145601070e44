//! Equality filters over document metadata.

use super::normalize::normalize;
use super::value::MetadataValue;
use crate::types::Metadata;
use serde::{Deserialize, Serialize};

/// How the clauses of a [`MetadataFilter`] combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Every clause must match (intersection, AND).
    #[default]
    All,
    /// At least one clause must match (union, OR).
    Any,
}

impl From<bool> for MatchMode {
    /// `true` means match all clauses.
    fn from(match_all: bool) -> Self {
        if match_all {
            MatchMode::All
        } else {
            MatchMode::Any
        }
    }
}

/// A set of `field = value` clauses.
///
/// Values are compared after normalization, so `"  Finance "` matches a
/// record stored with `"finance"`. A field appears at most once; setting it
/// again replaces the earlier value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    clauses: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Add or replace an equality clause in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<MetadataValue>) {
        let field = field.into();
        let value = value.into();
        match self.clauses.iter_mut().find(|(f, _)| *f == field) {
            Some(clause) => clause.1 = value,
            None => self.clauses.push((field, value)),
        }
    }

    /// True if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Iterate over `(field, value)` clauses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.clauses.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Evaluate this filter against one metadata map by direct comparison.
    ///
    /// An empty filter matches every map.
    pub fn matches(&self, metadata: &Metadata, mode: MatchMode) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut hits = self.clauses.iter().map(|(field, value)| {
            metadata
                .get(field)
                .map(|v| normalize(v) == normalize(value))
                .unwrap_or(false)
        });

        match mode {
            MatchMode::All => hits.all(|hit| hit),
            MatchMode::Any => hits.any(|hit| hit),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MetadataFilter
where
    K: Into<String>,
    V: Into<MetadataValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = MetadataFilter::new();
        for (field, value) in iter {
            filter.insert(field, value);
        }
        filter
    }
}
