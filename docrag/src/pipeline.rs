//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the two-phase workflow by composing a
//! [`Chunker`], an [`EmbeddingProvider`], a [`SearchStrategy`], and a
//! [`Generator`]:
//!
//! - `ingest`: chunk → embed (batch) → build a fresh [`VectorIndex`]
//! - `answer`: retrieve → assemble context → one generation call
//!
//! Both are all-or-nothing. The pipeline holds no index itself; callers keep
//! the index (see [`SessionStore`](crate::session::SessionStore)).
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{Document, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let index = pipeline.ingest(&document).await?;
//! let answer = pipeline.answer(Some(&index), "What colour is the sky?").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::document::{Document, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{ExhaustiveSearch, SearchStrategy, VectorIndex};
use crate::retriever::Retriever;

/// The generated answer together with what it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generator's response, unmodified.
    pub text: String,
    /// The context handed to the generator.
    pub context: String,
    /// The retrieved segments, most relevant first.
    pub sources: RetrievalResult,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    search_strategy: Arc<dyn SearchStrategy>,
    retriever: Retriever,
    assembler: ContextAssembler,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Ingest a document: chunk → embed → build index.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if the document produces no segments
    /// - [`RagError::EmbeddingUnavailable`] if embedding fails, times out, or
    ///   returns a different number of vectors than segments
    /// - [`RagError::DimensionMismatch`] if the vectors differ in length
    pub async fn ingest(&self, document: &Document) -> Result<VectorIndex> {
        let source = document.source().unwrap_or("-");

        // 1. Chunk the document
        let segments = self.chunker.chunk(document);
        if segments.is_empty() {
            error!(source, "document produced no segments");
            return Err(RagError::EmptyIndex);
        }

        // 2. Embed all segment texts in one batch
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        let provider = self.embedding_provider.name();
        let timeout = self.config.embed_timeout();
        let embeddings = match tokio::time::timeout(
            timeout,
            self.embedding_provider.embed_batch(&texts),
        )
        .await
        {
            Ok(Ok(embeddings)) => embeddings,
            Ok(Err(e)) => {
                error!(source, error = %e, "embedding failed during ingestion");
                return Err(e);
            }
            Err(_) => {
                error!(source, ?timeout, "embedding timed out during ingestion");
                return Err(RagError::embedding(
                    provider,
                    format!("timed out after {}ms", timeout.as_millis()),
                ));
            }
        };

        if embeddings.len() != segments.len() {
            error!(
                source,
                segments = segments.len(),
                embeddings = embeddings.len(),
                "embedding batch size mismatch"
            );
            return Err(RagError::embedding(
                provider,
                format!("returned {} embeddings for {} inputs", embeddings.len(), segments.len()),
            ));
        }

        // 3. Build the index
        let segment_count = segments.len();
        let entries = segments.into_iter().zip(embeddings);
        let index = VectorIndex::build_with(entries, self.search_strategy.clone())
            .inspect_err(|e| error!(source, error = %e, "index build failed"))?
            .with_model(provider);

        info!(
            source,
            index.id = %index.id(),
            segment_count,
            dimensions = index.dimensions(),
            "ingested document"
        );
        Ok(index)
    }

    /// Retrieve the configured `top_k` segments for `question`.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve`].
    pub async fn retrieve(
        &self,
        index: Option<&VectorIndex>,
        question: &str,
    ) -> Result<RetrievalResult> {
        self.retriever.retrieve(index, question, self.config.top_k).await
    }

    /// Answer `question` from `index`: retrieve → assemble → generate.
    ///
    /// Every call retrieves and generates afresh; nothing is cached.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotReady`] if `index` is `None`
    /// - [`RagError::EmbeddingUnavailable`] if the question cannot be embedded
    /// - [`RagError::GenerationUnavailable`] if generation fails or times out
    pub async fn answer(&self, index: Option<&VectorIndex>, question: &str) -> Result<Answer> {
        // 1. Retrieve
        let sources = self.retrieve(index, question).await.inspect_err(|e| {
            error!(error = %e, "retrieval failed");
        })?;

        // 2. Assemble context
        let context = self.assembler.assemble(&sources);

        // 3. Generate, exactly once
        let timeout = self.config.generation_timeout();
        let text = match tokio::time::timeout(timeout, self.generator.generate(question, &context))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!(error = %e, "generation failed");
                return Err(e);
            }
            Err(_) => {
                error!(?timeout, "generation timed out");
                return Err(RagError::generation(
                    self.generator.name(),
                    format!("timed out after {}ms", timeout.as_millis()),
                ));
            }
        };

        info!(hits = sources.len(), context_len = context.len(), "answered question");
        Ok(Answer { text, context, sources })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `generator` are required. The chunker defaults
/// to a [`RecursiveChunker`] sized from the config, and the search strategy
/// to [`ExhaustiveSearch`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn Generator>>,
    search_strategy: Option<Arc<dyn SearchStrategy>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the index search strategy.
    pub fn search_strategy(mut self, strategy: Arc<dyn SearchStrategy>) -> Self {
        self.search_strategy = Some(strategy);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if the config is invalid or a
    /// required collaborator is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::InvalidConfiguration("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let retriever = Retriever::new(embedding_provider.clone(), config.embed_timeout())
            .with_similarity_threshold(config.similarity_threshold);
        let assembler = ContextAssembler::new().with_max_chars(config.max_context_chars);

        Ok(RagPipeline {
            config,
            chunker,
            embedding_provider,
            generator,
            search_strategy: self.search_strategy.unwrap_or_else(|| Arc::new(ExhaustiveSearch)),
            retriever,
            assembler,
        })
    }
}
