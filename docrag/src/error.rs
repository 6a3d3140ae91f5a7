//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in ingestion, retrieval, and answering.
///
/// Every pipeline-level operation is all-or-nothing: when one of these is
/// returned, no partial segment list, index, or context has been exposed.
#[derive(Debug, Error)]
pub enum RagError {
    /// The uploaded document was not valid UTF-8.
    #[error("Decode error ({source_name}): {source}")]
    Decode {
        /// Name of the upload that failed to decode.
        source_name: String,
        /// The underlying UTF-8 error.
        #[source]
        source: std::str::Utf8Error,
    },

    /// A configuration validation error, such as `chunk_overlap >= chunk_size`.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An index was requested over zero entries.
    #[error("Cannot build an index from zero segments")]
    EmptyIndex,

    /// Embeddings (or a query vector) do not share the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the index was built with.
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// The embedding model could not be reached, timed out, or misbehaved.
    #[error("Embedding unavailable ({provider}): {message}")]
    EmbeddingUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation model could not be reached, timed out, or misbehaved.
    #[error("Generation unavailable ({provider}): {message}")]
    GenerationUnavailable {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A question was asked before any successful ingest in the session.
    #[error("No index is ready for session {session}; ingest a document first")]
    IndexNotReady {
        /// The session (or `"-"` when used outside a session).
        session: String,
    },

    /// The enclosing session was torn down while the operation was in flight.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl RagError {
    /// Whether the error came from an upstream model service.
    ///
    /// The core never retries; this lets a caller decide whether to.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingUnavailable { .. } | Self::GenerationUnavailable { .. })
    }

    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationUnavailable { provider: provider.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_upstream_failures_are_retryable() {
        assert!(RagError::embedding("mock", "down").is_retryable());
        assert!(RagError::generation("mock", "down").is_retryable());
        assert!(!RagError::EmptyIndex.is_retryable());
        assert!(!RagError::IndexNotReady { session: "s".into() }.is_retryable());
        assert!(!RagError::Cancelled("bye".into()).is_retryable());
    }

    #[test]
    fn messages_name_the_failing_piece() {
        let err = RagError::DimensionMismatch { expected: 3, actual: 4 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 4");

        let err = RagError::embedding("Ollama", "connection refused");
        assert_eq!(err.to_string(), "Embedding unavailable (Ollama): connection refused");
    }
}
