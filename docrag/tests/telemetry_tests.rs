//! Span capture for session-scoped operations.

mod common;

use std::sync::Arc;

use common::{COLOURS, word_hash_service};
use docrag::Document;
use docrag_telemetry::{InMemoryTraceLayer, SharedTraceStorage, SpanStatus};
use tracing_subscriber::layer::SubscriberExt;

#[tokio::test]
async fn ingest_and_answer_spans_are_keyed_by_session() {
    let storage = Arc::new(SharedTraceStorage::new());
    let subscriber =
        tracing_subscriber::registry().with(InMemoryTraceLayer::new(storage.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let service = word_hash_service();
    let session = service.open_session().await;
    service
        .ingest(session, &Document::new(COLOURS).with_metadata("source", "colours.txt"))
        .await
        .unwrap();
    service.answer(session, "What colour is the sky?").await.unwrap();

    let spans = storage.get_spans(&session.to_string()).expect("session spans");
    let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["rag.ingest", "rag.answer"]);

    let ingest = &spans[0];
    assert_eq!(ingest.attributes["source"], "colours.txt");
    assert!(ingest.has_event("ingested document"));
    assert!(ingest.has_event("session index updated"));
    assert!(spans[1].has_event("answered question"));
    assert!(spans.iter().all(|s| s.status == SpanStatus::Ok));
}

#[tokio::test]
async fn answer_before_ingest_marks_nothing_as_error() {
    let storage = Arc::new(SharedTraceStorage::new());
    let subscriber =
        tracing_subscriber::registry().with(InMemoryTraceLayer::new(storage.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let service = word_hash_service();
    let session = service.open_session().await;
    assert!(service.answer(session, "anything").await.is_err());

    let spans = storage.get_spans(&session.to_string()).expect("session spans");
    assert_eq!(spans.len(), 1);
    assert!(spans[0].has_event("question asked before ingest"));
    assert_eq!(spans[0].status, SpanStatus::Ok);
}
