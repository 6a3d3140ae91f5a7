use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use docrag::{EmbeddingProvider, Generator, RagConfig, RagError, RagPipeline, RagService, Result};
use docrag_cli::ingest_file;

struct LengthEmbedder;

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }

    fn name(&self) -> &str {
        "length"
    }
}

struct FixedGenerator;

#[async_trait]
impl Generator for FixedGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Ok("42".into())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn service() -> RagService {
    let config = RagConfig::builder().chunk_size(40).chunk_overlap(4).top_k(2).build().unwrap();
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(LengthEmbedder))
        .generator(Arc::new(FixedGenerator))
        .build()
        .unwrap();
    RagService::new(Arc::new(pipeline))
}

#[tokio::test]
async fn test_ingest_file_records_path_as_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "The sky is blue. The grass is green. Snow is white in winter.").unwrap();

    let service = service();
    let session = service.open_session().await;
    let report = ingest_file(&service, session, file.path()).await.unwrap();

    assert!(report.segment_count >= 2);
    let index = service.sessions().index(session).await.unwrap();
    let expected = file.path().display().to_string();
    assert!(index.entries().iter().all(|e| e.segment.metadata.get("source") == Some(&expected)));

    let answer = service.answer(session, "sky?").await.unwrap();
    assert_eq!(answer.text, "42");
}

#[tokio::test]
async fn test_ingest_file_rejects_invalid_utf8() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x66, 0x6f, 0xff, 0xfe]).unwrap();

    let service = service();
    let session = service.open_session().await;
    let err = ingest_file(&service, session, file.path()).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::Decode { .. })));
    assert!(service.sessions().index(session).await.is_none());
}

#[tokio::test]
async fn test_ingest_missing_file_fails() {
    let service = service();
    let session = service.open_session().await;
    let err = ingest_file(&service, session, std::path::Path::new("/definitely/not/here.txt"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}
