//! Data types for documents, segments, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Metadata key holding the uploaded file name.
pub const SOURCE_KEY: &str = "source";

/// A fixed-length embedding vector.
pub type Embedding = Vec<f32>;

/// A source document containing text content and metadata.
///
/// Created once per upload and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata associated with the document, e.g. `{"source": "notes.txt"}`.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document from text with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: HashMap::new() }
    }

    /// Decode raw upload bytes as UTF-8, recording `source` in the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Decode`] if `bytes` is not valid UTF-8.
    pub fn from_bytes(bytes: &[u8], source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let content = std::str::from_utf8(bytes)
            .map_err(|e| RagError::Decode { source_name: source.clone(), source: e })?;
        Ok(Self::new(content).with_metadata(SOURCE_KEY, source))
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata value, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A contiguous slice of a [`Document`], the atomic unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// The text content of the segment, including any overlap prefix.
    pub text: String,
    /// Metadata inherited unchanged from the parent document.
    pub metadata: HashMap<String, String>,
    /// Position within the document, 0-based. Used for stable tie-breaking.
    pub ordinal: usize,
    /// Character offset of the first character of `text` within the document.
    pub char_start: usize,
    /// Number of leading characters of `text` repeated from the previous segment.
    pub overlap: usize,
}

impl Segment {
    /// Length of the segment in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The text that follows the overlap prefix, i.e. content first seen in this segment.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }
}

/// A [`Segment`] paired with its embedding, as stored in a
/// [`VectorIndex`](crate::index::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed segment.
    pub segment: Segment,
    /// The vector embedding for the segment's text.
    pub embedding: Embedding,
}

/// A retrieved [`Segment`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved segment.
    pub segment: Segment,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}

/// Search hits ordered by descending score, ties by ascending ordinal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// Wrap hits that are already ranked.
    pub(crate) fn from_ranked(hits: Vec<SearchResult>) -> Self {
        Self { hits }
    }

    /// The ranked hits, most relevant first.
    pub fn hits(&self) -> &[SearchResult] {
        &self.hits
    }

    /// Iterate over the ranked hits.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.hits.iter()
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Drop hits scoring below `threshold`, preserving rank order.
    pub fn retain_above(&mut self, threshold: f32) {
        self.hits.retain(|hit| hit.score >= threshold);
    }

    /// Consume the result, yielding the ranked hits.
    pub fn into_hits(self) -> Vec<SearchResult> {
        self.hits
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}
