//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text hierarchically (paragraphs → lines → sentences → words →
//! characters) and merges the pieces back into segments bounded by
//! `chunk_size` characters, each sharing a `chunk_overlap`-character prefix
//! with its predecessor.
//!
//! Segments are contiguous slices of the source text. Separators stay
//! attached to the text before them, so dropping each segment's overlap
//! prefix and concatenating the rest reproduces the document exactly.

use crate::document::{Document, Segment};
use crate::error::{RagError, Result};

/// Default maximum segment length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive segments in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 10;

/// Separators tried in priority order. The empty separator splits into
/// single characters and always succeeds.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// A strategy for splitting documents into segments.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered segments.
    ///
    /// Returns an empty `Vec` if the document has empty content.
    fn chunk(&self, document: &Document) -> Vec<Segment>;
}

/// Split `document` with a [`RecursiveChunker`] built from the given sizes.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`.
pub fn split(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Segment>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Splits text hierarchically by a priority list of separators.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 10)?;
/// let segments = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per segment
    /// * `chunk_overlap`: number of characters repeated from the previous segment
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Replace the separator priority list.
    ///
    /// Text that no separator can break is split into single characters.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum segment length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive segments in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// A contiguous region of the source text.
#[derive(Debug, Clone, Copy)]
struct Span {
    /// Byte range in the source text.
    start: usize,
    end: usize,
    /// Character offset of `start` and length in characters.
    char_start: usize,
    chars: usize,
    /// Leading characters shared with the previous span.
    overlap: usize,
}

impl Span {
    fn extend(&mut self, piece: &Span) {
        self.end = piece.end;
        self.chars += piece.chars;
    }
}

/// Split text at a separator while keeping the separator attached to the
/// preceding part. Yields `(byte_offset, part)` pairs.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push((start, &text[start..end]));
        start = end;
    }

    if start < text.len() {
        result.push((start, &text[start..]));
    }

    result
}

/// Break `text` into pieces of at most `max_chars` characters, trying each
/// separator in turn and recursing into pieces that are still too long.
fn split_pieces(
    text: &str,
    offset: usize,
    char_offset: usize,
    max_chars: usize,
    separators: &[&str],
    out: &mut Vec<Span>,
) {
    let chars = text.chars().count();
    if chars <= max_chars {
        out.push(Span {
            start: offset,
            end: offset + text.len(),
            char_start: char_offset,
            chars,
            overlap: 0,
        });
        return;
    }

    match separators.split_first() {
        Some((separator, rest)) if !separator.is_empty() => {
            if !text.contains(separator) {
                split_pieces(text, offset, char_offset, max_chars, rest, out);
                return;
            }
            let mut part_chars = char_offset;
            for (start, part) in split_keeping_separator(text, separator) {
                split_pieces(part, offset + start, part_chars, max_chars, rest, out);
                part_chars += part.chars().count();
            }
        }
        // Last resort: every character is its own piece.
        _ => {
            for (i, (start, c)) in text.char_indices().enumerate() {
                out.push(Span {
                    start: offset + start,
                    end: offset + start + c.len_utf8(),
                    char_start: char_offset + i,
                    chars: 1,
                    overlap: 0,
                });
            }
        }
    }
}

/// The tail of `done` that the next span repeats.
fn carry_overlap(text: &str, done: &Span, chunk_overlap: usize) -> Span {
    let overlap = chunk_overlap.min(done.chars);
    let start = if overlap == 0 {
        done.end
    } else {
        text[done.start..done.end]
            .char_indices()
            .rev()
            .nth(overlap - 1)
            .map_or(done.start, |(byte, _)| done.start + byte)
    };
    Span {
        start,
        end: done.end,
        char_start: done.char_start + done.chars - overlap,
        chars: overlap,
        overlap,
    }
}

/// Greedily merge pieces into spans of at most `chunk_size` characters.
///
/// Pieces are at most `chunk_size - chunk_overlap` characters, so a carried
/// overlap plus one piece always fits.
fn merge_pieces(text: &str, pieces: &[Span], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current: Option<Span> = None;

    for piece in pieces {
        if let Some(span) = current.as_mut() {
            if span.chars + piece.chars <= chunk_size {
                span.extend(piece);
                continue;
            }
        }

        let next = match current.take() {
            Some(done) => {
                let mut carried = carry_overlap(text, &done, chunk_overlap);
                spans.push(done);
                carried.extend(piece);
                carried
            }
            None => *piece,
        };
        current = Some(next);
    }

    spans.extend(current);
    spans
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Segment> {
        let text = document.content.as_str();
        if text.is_empty() {
            return Vec::new();
        }

        let total = text.chars().count();
        let spans = if total <= self.chunk_size {
            vec![Span { start: 0, end: text.len(), char_start: 0, chars: total, overlap: 0 }]
        } else {
            let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
            let mut pieces = Vec::new();
            let max_piece = self.chunk_size - self.chunk_overlap;
            split_pieces(text, 0, 0, max_piece, &separators, &mut pieces);
            merge_pieces(text, &pieces, self.chunk_size, self.chunk_overlap)
        };

        spans
            .into_iter()
            .enumerate()
            .map(|(ordinal, span)| Segment {
                text: text[span.start..span.end].to_string(),
                metadata: document.metadata.clone(),
                ordinal,
                char_start: span.char_start,
                overlap: span.overlap,
            })
            .collect()
    }
}
