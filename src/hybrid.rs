//! Hybrid search: metadata filtering over an externally ranked candidate list.
//!
//! The ranking (typically from a vector-similarity search) is the signal
//! that matters to callers. Filtering only removes candidates; it never
//! reorders the survivors.

use crate::metadata::{MatchMode, MetadataFilter, MetadataIndex};
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};

/// A ranked candidate that can be filtered by id.
pub trait Candidate {
    /// Document id of the candidate.
    fn candidate_id(&self) -> &str;
}

impl Candidate for DocumentId {
    fn candidate_id(&self) -> &str {
        self.as_str()
    }
}

impl Candidate for String {
    fn candidate_id(&self) -> &str {
        self
    }
}

impl Candidate for &str {
    fn candidate_id(&self) -> &str {
        self
    }
}

/// A candidate id with the similarity score it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The id of the matched document.
    pub id: DocumentId,
    /// Score assigned by the ranking collaborator.
    pub score: f32,
}

impl ScoredCandidate {
    /// Create a new ScoredCandidate.
    #[inline]
    pub fn new(id: impl Into<DocumentId>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

impl Candidate for ScoredCandidate {
    fn candidate_id(&self) -> &str {
        self.id.as_str()
    }
}

impl From<(DocumentId, f32)> for ScoredCandidate {
    fn from((id, score): (DocumentId, f32)) -> Self {
        Self { id, score }
    }
}

/// Keep the candidates that satisfy every clause of `filter`, in rank order.
///
/// An empty filter returns the candidates unchanged. Otherwise the allowed
/// set is `index.search(filter, MatchMode::All)` and the result is the
/// subsequence of `ranked` whose ids are in it.
pub fn hybrid_search<T: Candidate + Clone>(
    ranked: &[T],
    index: &MetadataIndex,
    filter: &MetadataFilter,
) -> Vec<T> {
    if filter.is_empty() {
        return ranked.to_vec();
    }

    let allowed = index.search(filter, MatchMode::All);
    let results: Vec<T> = ranked
        .iter()
        .filter(|candidate| allowed.contains(candidate.candidate_id()))
        .cloned()
        .collect();

    tracing::debug!(
        target: "forge_docstore::hybrid",
        candidates = ranked.len(),
        allowed = allowed.len(),
        results = results.len(),
        "Hybrid search"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::types::Metadata;

    fn index() -> MetadataIndex {
        let mut index = MetadataIndex::new(IndexConfig::in_memory());
        let records: Vec<(DocumentId, Metadata)> = [
            ("c1", "finance"),
            ("c2", "legal"),
            ("c3", "finance"),
            ("c4", "hr"),
        ]
        .iter()
        .map(|(id, category)| {
            let mut metadata = Metadata::new();
            metadata.insert("category".to_string(), (*category).into());
            (DocumentId::new(*id), metadata)
        })
        .collect();
        index.index_records(&records, None);
        index
    }

    #[test]
    fn test_preserves_rank_order() {
        let index = index();
        let ranked: Vec<DocumentId> = ["c1", "c2", "c3", "c4"].iter().map(|s| DocumentId::new(*s)).collect();
        let filter = MetadataFilter::new().eq("category", "Finance");

        let result = hybrid_search(&ranked, &index, &filter);
        assert_eq!(result, vec![DocumentId::new("c1"), DocumentId::new("c3")]);
    }

    #[test]
    fn test_reversed_rank_stays_reversed() {
        let index = index();
        let ranked = vec!["c4", "c3", "c2", "c1"];
        let filter = MetadataFilter::new().eq("category", "finance");

        assert_eq!(hybrid_search(&ranked, &index, &filter), vec!["c3", "c1"]);
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let index = index();
        let ranked = vec!["c9".to_string(), "c2".to_string()];
        assert_eq!(hybrid_search(&ranked, &index, &MetadataFilter::new()), ranked);
    }

    #[test]
    fn test_scores_survive() {
        let index = index();
        let ranked = vec![
            ScoredCandidate::new("c3", 0.91),
            ScoredCandidate::new("c2", 0.85),
            ScoredCandidate::new("c1", 0.40),
        ];
        let filter = MetadataFilter::new().eq("category", "finance");

        let result = hybrid_search(&ranked, &index, &filter);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], ScoredCandidate::new("c3", 0.91));
        assert_eq!(result[1].score, 0.40);
    }

    #[test]
    fn test_unknown_candidates_dropped() {
        let index = index();
        let ranked = vec!["ghost", "c1"];
        let filter = MetadataFilter::new().eq("category", "finance");
        assert_eq!(hybrid_search(&ranked, &index, &filter), vec!["c1"]);
    }
}
