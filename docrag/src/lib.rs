//! # docrag
//!
//! Single-document retrieval-augmented question answering.
//!
//! ## Overview
//!
//! Upload one text document, ask questions about it. The crate covers the
//! ingestion-and-retrieval core:
//!
//! - [`RecursiveChunker`] - splits text into overlapping, size-bounded segments
//! - [`EmbeddingProvider`] - maps text to vectors (bring your own, or enable `ollama`)
//! - [`VectorIndex`] - immutable per-document index with cosine similarity search
//! - [`Retriever`] - embeds a question and fetches the top-K segments
//! - [`ContextAssembler`] - joins retrieved segments into a prompt context
//! - [`RagPipeline`] - `ingest` and `answer` orchestration
//! - [`RagService`] / [`SessionStore`] - one index per session, swapped atomically
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{Document, RagConfig, RagPipeline, RagService};
//! use docrag::ollama::{OllamaEmbeddingProvider, OllamaGenerator};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new()))
//!     .generator(Arc::new(OllamaGenerator::new()))
//!     .build()?;
//!
//! let service = RagService::new(Arc::new(pipeline));
//! let session = service.open_session().await;
//! service.ingest(session, &Document::from_bytes(&bytes, "notes.txt")?).await?;
//! let answer = service.answer(session, "What is this document about?").await?;
//! println!("{}", answer.text);
//! ```
//!
//! ## Features
//!
//! - `ollama` - [`ollama::OllamaEmbeddingProvider`] and [`ollama::OllamaGenerator`]

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod session;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use chunking::{Chunker, RecursiveChunker, split};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::ContextAssembler;
pub use document::{Document, Embedding, IndexEntry, RetrievalResult, SearchResult, Segment};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{Generator, format_prompt};
pub use index::{ExhaustiveSearch, SearchStrategy, VectorIndex, cosine_similarity};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use session::{IngestReport, RagService, SessionId, SessionInfo, SessionStore};
