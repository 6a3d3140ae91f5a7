//! Generator trait for the language model that writes the final answer.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that answers a question from retrieved context.
///
/// The pipeline issues exactly one call per answer. Retries, if any, belong
/// to the implementation, not to the pipeline.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer to `question` grounded in `context`.
    ///
    /// Fails with [`RagError::GenerationUnavailable`](crate::RagError::GenerationUnavailable)
    /// when the model cannot be reached.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// The model identifier, e.g. `llama3`.
    fn name(&self) -> &str;
}

/// Render the single user message sent to chat-style models.
pub fn format_prompt(question: &str, context: &str) -> String {
    format!("Question: {question}\n\nContext: {context}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_puts_question_before_context() {
        assert_eq!(
            format_prompt("Why?", "Because.\n\nAlso this."),
            "Question: Why?\n\nContext: Because.\n\nAlso this."
        );
    }
}
