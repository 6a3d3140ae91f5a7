//! Configuration for the RAG pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{RagError, Result};
use crate::retriever::DEFAULT_TOP_K;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum segment size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive segments.
    pub chunk_overlap: usize,
    /// Number of segments retrieved per question.
    pub top_k: usize,
    /// Minimum similarity score for retrieved segments. `None` keeps everything.
    pub similarity_threshold: Option<f32>,
    /// Upper bound on the assembled context in characters. `None` means unbounded.
    pub max_context_chars: Option<usize>,
    /// Timeout for each embedding call, in seconds.
    pub embed_timeout_secs: u64,
    /// Timeout for each generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Idle time after which a session and its index are dropped, in seconds.
    pub session_ttl_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: None,
            max_context_chars: None,
            embed_timeout_secs: 30,
            generation_timeout_secs: 120,
            session_ttl_secs: 30 * 60,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Timeout for each embedding call.
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    /// Timeout for each generation call.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Idle time after which a session expires.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - either timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidConfiguration("top_k must be greater than zero".into()));
        }
        if self.embed_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(RagError::InvalidConfiguration("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum segment size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive segments in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of segments retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for retrieved segments.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Cap the assembled context at `max_chars` characters.
    pub fn max_context_chars(mut self, max_chars: usize) -> Self {
        self.config.max_context_chars = Some(max_chars);
        self
    }

    /// Set the embedding timeout.
    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.config.embed_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the generation timeout.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the idle session lifetime.
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl_secs = ttl.as_secs();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
