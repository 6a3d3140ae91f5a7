//! Ollama embedding and chat adapters.
//!
//! This module is only available when the `ollama` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::Embedding;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{Generator, format_prompt};

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default model for both embeddings and chat.
pub const DEFAULT_MODEL: &str = "llama3";

/// Default per-request HTTP timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        // Requests still go through the embed/generation timeouts in the pipeline.
        warn!(
            provider = "Ollama",
            error = %e,
            ?timeout,
            "falling back to a client without timeout"
        );
        reqwest::Client::new()
    })
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ── Ollama API request/response types ─────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Read an error body, preferring Ollama's `{"error": "..."}` shape.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new().with_model("nomic-embed-text");
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the local server and the default model.
    pub fn new() -> Self {
        Self {
            client: build_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
        }
    }

    /// Set the server address, e.g. `http://gpu-box:11434`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!(provider = "Ollama", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("Ollama", "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "Ollama",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self
            .client
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "request failed");
                RagError::embedding("Ollama", format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = "Ollama", %detail, "API error");
            return Err(RagError::embedding("Ollama", detail));
        }

        let embed_response: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse response");
            RagError::embedding("Ollama", format!("failed to parse response: {e}"))
        })?;

        Ok(embed_response.embeddings)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// A [`Generator`] backed by Ollama's non-streaming `/api/chat` endpoint.
///
/// Sends one user message of the form `Question: ...\n\nContext: ...`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Create a generator for the local server and the default model.
    pub fn new() -> Self {
        Self {
            client: build_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
        }
    }

    /// Set the server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

impl Default for OllamaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        debug!(
            provider = "Ollama",
            model = %self.model,
            context_len = context.len(),
            "generating answer"
        );

        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: format_prompt(question, context),
            }],
            stream: false,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/chat"))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "chat request failed");
                RagError::generation("Ollama", format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = "Ollama", %detail, "chat API error");
            return Err(RagError::generation("Ollama", detail));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse chat response");
            RagError::generation("Ollama", format!("failed to parse response: {e}"))
        })?;

        Ok(chat_response.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(endpoint("http://h:1/", "api/embed"), "http://h:1/api/embed");
        assert_eq!(endpoint("http://h:1", "api/chat"), "http://h:1/api/chat");
    }

    #[test]
    fn embed_request_wire_shape() {
        let body = serde_json::to_value(EmbedRequest { model: "llama3", input: vec!["a", "b"] })
            .unwrap();
        assert_eq!(body, serde_json::json!({"model": "llama3", "input": ["a", "b"]}));
    }

    #[test]
    fn chat_request_is_non_streaming_single_message() {
        let body = serde_json::to_value(ChatRequest {
            model: "llama3",
            messages: vec![ChatMessage { role: "user".into(), content: format_prompt("q", "c") }],
            stream: false,
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "Question: q\n\nContext: c");
    }

    #[test]
    fn parses_responses() {
        let embed: EmbedResponse =
            serde_json::from_str(r#"{"model":"llama3","embeddings":[[0.1,0.2],[0.3,0.4]]}"#)
                .unwrap();
        assert_eq!(embed.embeddings.len(), 2);

        let chat: ChatResponse = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":"Blue."},"done":true}"#,
        )
        .unwrap();
        assert_eq!(chat.message.content, "Blue.");
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_per_provider() {
        // Nothing listens on the discard port.
        let embedder = OllamaEmbeddingProvider::new()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let err = embedder.embed("sky").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::EmbeddingUnavailable { ref message, .. } if message.contains("request failed")
        ));

        let generator = OllamaGenerator::new()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let err = generator.generate("q", "c").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable { .. }));
        assert!(err.is_retryable());
    }
}
