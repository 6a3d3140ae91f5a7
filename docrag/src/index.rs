//! Immutable per-document vector index with cosine similarity search.
//!
//! A [`VectorIndex`] is built once from `(Segment, Embedding)` pairs and is
//! never mutated afterwards; re-ingesting a document builds a new index.
//! Ranking is delegated to a [`SearchStrategy`]; the default
//! [`ExhaustiveSearch`] scans every entry.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::document::{Embedding, IndexEntry, RetrievalResult, SearchResult, Segment};
use crate::error::{RagError, Result};

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_finite() { score } else { 0.0 }
}

/// A ranking strategy over the entries of one index.
///
/// Implementations return at most `k` `(entry_position, score)` pairs ordered
/// by descending score, ties broken by ascending segment ordinal. The query
/// has already been checked against the index dimension.
pub trait SearchStrategy: Send + Sync + fmt::Debug {
    /// Rank `entries` against `query`.
    fn search(&self, entries: &[IndexEntry], query: &[f32], k: usize) -> Vec<(usize, f32)>;

    /// A short name for logs.
    fn name(&self) -> &str;
}

/// Brute-force linear scan scoring every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveSearch;

impl SearchStrategy for ExhaustiveSearch {
    fn search(&self, entries: &[IndexEntry], query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.embedding, query)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| entries[a.0].segment.ordinal.cmp(&entries[b.0].segment.ordinal))
        });
        scored.truncate(k);
        scored
    }

    fn name(&self) -> &str {
        "exhaustive"
    }
}

/// The vector index for one ingested document.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::VectorIndex;
///
/// let index = VectorIndex::build(segments.into_iter().zip(embeddings))?;
/// let result = index.search(&query_embedding, 4)?;
/// ```
#[derive(Debug, Clone)]
pub struct VectorIndex {
    id: Uuid,
    entries: Vec<IndexEntry>,
    dimensions: usize,
    model: Option<String>,
    built_at: DateTime<Utc>,
    strategy: Arc<dyn SearchStrategy>,
}

impl VectorIndex {
    /// Build an index using [`ExhaustiveSearch`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] if `entries` is empty, or
    /// [`RagError::DimensionMismatch`] if embedding lengths differ.
    pub fn build<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Segment, Embedding)>,
    {
        Self::build_with(entries, Arc::new(ExhaustiveSearch))
    }

    /// Build an index ranked by the given strategy.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with<I>(entries: I, strategy: Arc<dyn SearchStrategy>) -> Result<Self>
    where
        I: IntoIterator<Item = (Segment, Embedding)>,
    {
        let entries: Vec<IndexEntry> = entries
            .into_iter()
            .map(|(segment, embedding)| IndexEntry { segment, embedding })
            .collect();

        let dimensions = entries.first().ok_or(RagError::EmptyIndex)?.embedding.len();
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(RagError::DimensionMismatch {
                expected: dimensions,
                actual: bad.embedding.len(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            entries,
            dimensions,
            model: None,
            built_at: Utc::now(),
            strategy,
        })
    }

    /// Record the embedding model identifier the index was built with.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Return the `k` entries most similar to `query`.
    ///
    /// Returns fewer than `k` results when the index is smaller, and none when
    /// `k == 0`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` does not have the
    /// index dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(RetrievalResult::default());
        }

        let hits = self
            .strategy
            .search(&self.entries, query, k.min(self.entries.len()))
            .into_iter()
            .filter_map(|(i, score)| {
                self.entries.get(i).map(|e| SearchResult { segment: e.segment.clone(), score })
            })
            .collect();
        Ok(RetrievalResult::from_ranked(hits))
    }

    /// Unique identifier of this build.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of indexed segments. Never zero.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; an index is never built empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by every entry.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The embedding model identifier, if recorded.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// When the index was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// The indexed entries in document order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Name of the ranking strategy.
    pub fn strategy(&self) -> &str {
        self.strategy.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn segment(ordinal: usize, text: &str) -> Segment {
        Segment {
            text: text.to_string(),
            metadata: HashMap::new(),
            ordinal,
            char_start: 0,
            overlap: 0,
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_is_scale_invariant() {
        let a = cosine_similarity(&[1.0, 2.0], &[2.0, 1.0]);
        let b = cosine_similarity(&[10.0, 20.0], &[2.0, 1.0]);
        assert!((a - b).abs() < 1e-6);
        assert!((cosine_similarity(&[3.0, 4.0], &[3.0, 4.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_scores_collapse_to_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn build_rejects_empty_input() {
        let err = VectorIndex::build(Vec::<(Segment, Embedding)>::new()).unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let err = VectorIndex::build(vec![
            (segment(0, "a"), vec![1.0, 0.0]),
            (segment(1, "b"), vec![1.0, 0.0, 0.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn search_rejects_query_of_wrong_length() {
        let index = VectorIndex::build(vec![(segment(0, "a"), vec![1.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RagError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn ties_prefer_earlier_segments() {
        let index = VectorIndex::build(vec![
            (segment(0, "first"), vec![1.0, 0.0]),
            (segment(1, "second"), vec![2.0, 0.0]),
            (segment(2, "other"), vec![0.0, 1.0]),
        ])
        .unwrap();

        let result = index.search(&[1.0, 0.0], 2).unwrap();
        let ordinals: Vec<usize> = result.iter().map(|h| h.segment.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
    }

    #[test]
    fn search_with_zero_k_is_empty() {
        let index = VectorIndex::build(vec![(segment(0, "a"), vec![1.0])]).unwrap();
        assert!(index.search(&[1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn records_model_and_strategy() {
        let index =
            VectorIndex::build(vec![(segment(0, "a"), vec![1.0])]).unwrap().with_model("llama3");
        assert_eq!(index.model(), Some("llama3"));
        assert_eq!(index.strategy(), "exhaustive");
        assert_eq!(index.dimensions(), 1);
        assert_eq!(index.len(), 1);
    }
}
