//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::document::Embedding;
use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding model behind a unified async
/// interface. The same model must be used for ingest and for queries against
/// the resulting index; this is not checked.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    ///
    /// Fails with [`RagError::EmbeddingUnavailable`](crate::RagError::EmbeddingUnavailable)
    /// when the model cannot be reached.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Output order matches input order one-to-one. An empty batch yields an
    /// empty output without contacting the model.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The model identifier, e.g. `llama3`.
    fn name(&self) -> &str;
}
