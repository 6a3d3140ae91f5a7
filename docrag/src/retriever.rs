//! Query-side retrieval: embed the question, search the index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Default number of segments retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Embeds questions and fetches the top-K matching segments.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a retriever around an embedding provider.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, embed_timeout: Duration) -> Self {
        Self { embedding_provider, embed_timeout, similarity_threshold: None }
    }

    /// Drop hits scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Retrieve the `k` segments of `index` most similar to `question`.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotReady`] if `index` is `None`
    /// - [`RagError::EmbeddingUnavailable`] if the question cannot be embedded
    ///   within the timeout
    /// - [`RagError::DimensionMismatch`] if the query vector does not match the index
    pub async fn retrieve(
        &self,
        index: Option<&VectorIndex>,
        question: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        let index = index.ok_or_else(|| RagError::IndexNotReady { session: "-".into() })?;

        let query_embedding = embed_with_timeout(
            self.embedding_provider.as_ref(),
            question,
            self.embed_timeout,
        )
        .await?;

        let mut result = index.search(&query_embedding, k)?;
        if let Some(threshold) = self.similarity_threshold {
            result.retain_above(threshold);
        }

        debug!(index.id = %index.id(), k, hits = result.len(), "retrieved segments");
        Ok(result)
    }
}

async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    match tokio::time::timeout(timeout, provider.embed(text)).await {
        Ok(result) => result,
        Err(_) => {
            error!(provider = provider.name(), ?timeout, "query embedding timed out");
            Err(RagError::embedding(
                provider.name(),
                format!("timed out after {}ms", timeout.as_millis()),
            ))
        }
    }
}
