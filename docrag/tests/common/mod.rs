//! Deterministic collaborator doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docrag::{
    EmbeddingProvider, Generator, RagConfig, RagError, RagPipeline, RagService, Result,
};
use tokio::sync::Notify;

pub const DIM: usize = 64;

/// Bag-of-words embeddings: each lowercase word bumps one hashed bucket.
///
/// Texts sharing words get a positive cosine score; texts sharing none score 0.
#[derive(Debug, Default)]
pub struct WordHashEmbedder {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        v[(hash % DIM as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingUnavailable {
                provider: "word-hash".into(),
                message: "connection refused".into(),
            });
        }
        Ok(word_vector(text))
    }

    fn name(&self) -> &str {
        "word-hash"
    }
}

/// Never answers until the test lets it; announces each call.
#[derive(Debug, Default)]
pub struct StallingEmbedder {
    pub started: Notify,
}

#[async_trait]
impl EmbeddingProvider for StallingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.started.notify_one();
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Returns one vector fewer than requested.
#[derive(Debug, Default)]
pub struct ShortBatchEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortBatchEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(word_vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|t| word_vector(t)).collect())
    }

    fn name(&self) -> &str {
        "short-batch"
    }
}

/// Echoes its inputs so tests can inspect what the pipeline handed over.
#[derive(Debug, Default)]
pub struct EchoGenerator {
    pub fail: AtomicBool,
    pub stall: AtomicBool,
    pub calls: AtomicUsize,
    /// Signalled when a call starts stalling.
    pub started: Notify,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::GenerationUnavailable {
                provider: "echo".into(),
                message: "model not loaded".into(),
            });
        }
        if self.stall.load(Ordering::SeqCst) {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(format!("Q: {question} | C: {context}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub fn small_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(60)
        .chunk_overlap(5)
        .top_k(2)
        .embed_timeout(Duration::from_secs(5))
        .generation_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn pipeline(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
) -> RagPipeline {
    RagPipeline::builder()
        .config(small_config())
        .embedding_provider(embedder)
        .generator(generator)
        .build()
        .unwrap()
}

pub fn service(embedder: Arc<dyn EmbeddingProvider>, generator: Arc<dyn Generator>) -> RagService {
    RagService::new(Arc::new(pipeline(embedder, generator)))
}

/// A service over fresh [`WordHashEmbedder`] and [`EchoGenerator`] doubles.
pub fn word_hash_service() -> RagService {
    service(Arc::new(WordHashEmbedder::default()), Arc::new(EchoGenerator::default()))
}

pub const COLOURS: &str = "The sky is blue on a clear day.\n\n\
    Grass is green because of chlorophyll.\n\n\
    Snow is white and cold in the winter months.";

pub const FRUIT: &str = "Apples grow on trees in orchards.\n\n\
    Bananas are yellow when they ripen.\n\n\
    Cherries are small red stone fruits.";
