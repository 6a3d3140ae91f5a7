//! Context assembly for the generation prompt.

use crate::document::RetrievalResult;

/// Separator placed between segments: a blank line.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Joins retrieved segments into one context string, most relevant first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler {
    max_chars: Option<usize>,
}

impl ContextAssembler {
    /// An assembler with no size budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the context to `max_chars` characters.
    ///
    /// Lower-ranked segments that do not fit are left out whole; the top hit
    /// is always included.
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Concatenate the segment texts of `result` in rank order.
    ///
    /// An empty result produces an empty string.
    pub fn assemble(&self, result: &RetrievalResult) -> String {
        let mut context = String::new();
        let mut used = 0;

        for (i, hit) in result.iter().enumerate() {
            let text_chars = hit.segment.char_len();
            let added = if i == 0 { text_chars } else { SEGMENT_SEPARATOR.len() + text_chars };
            if let Some(max) = self.max_chars {
                if i > 0 && used + added > max {
                    break;
                }
            }
            if i > 0 {
                context.push_str(SEGMENT_SEPARATOR);
            }
            context.push_str(&hit.segment.text);
            used += added;
        }

        context
    }
}
