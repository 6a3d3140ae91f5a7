use std::sync::Arc;

use tracing::{error, info, info_span};
use tracing_subscriber::layer::SubscriberExt;

use crate::memory::{InMemoryTraceLayer, SharedTraceStorage, SpanStatus};

fn capture<F: FnOnce()>(f: F) -> Arc<SharedTraceStorage> {
    let storage = Arc::new(SharedTraceStorage::new());
    let subscriber =
        tracing_subscriber::registry().with(InMemoryTraceLayer::new(storage.clone()));
    tracing::subscriber::with_default(subscriber, f);
    storage
}

#[test]
fn session_spans_are_captured_with_events() {
    let storage = capture(|| {
        let span = info_span!("rag.ingest", session.id = "session-456", source = "notes.txt");
        let _guard = span.enter();
        info!(segment_count = 3u64, "ingested document");
    });

    let spans = storage.get_spans("session-456").expect("spans under session id");
    assert_eq!(spans.len(), 1);

    let span = &spans[0];
    assert_eq!(span.name, "rag.ingest");
    assert_eq!(span.attributes["source"], "notes.txt");
    assert!(span.start_time > 0);
    assert!(span.end_time >= span.start_time);
    assert_eq!(span.status, SpanStatus::Ok);
    assert!(span.has_event("ingested document"));
    assert_eq!(span.events[0].fields["segment_count"], 3);
}

#[test]
fn child_spans_inherit_session() {
    let storage = capture(|| {
        let outer = info_span!("rag.answer", session.id = "session-789");
        let _outer = outer.enter();
        let inner = info_span!("embed");
        let _inner = inner.enter();
        error!("upstream refused");
    });

    let spans = storage.get_spans("session-789").expect("spans under session id");
    let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["embed", "rag.answer"]);
    assert_eq!(spans[0].status, SpanStatus::Error);
    assert_eq!(spans[0].parent_id.as_deref(), Some(spans[1].id.as_str()));
    assert_eq!(spans[1].status, SpanStatus::Ok);
}

#[test]
fn spans_without_session_are_ignored() {
    let storage = capture(|| {
        let span = info_span!("startup");
        let _guard = span.enter();
        info!("no session here");
    });

    assert!(storage.sessions().is_empty());
}

#[test]
fn global_init_only_succeeds_once() {
    let storage = Arc::new(SharedTraceStorage::new());
    assert!(crate::init_with_storage("docrag-test", storage.clone()).is_ok());
    assert!(matches!(
        crate::init_with_format("docrag-test", crate::LogFormat::Json),
        Err(crate::TelemetryError::Init(_))
    ));

    {
        let span = info_span!("rag.answer", session.id = "global-session");
        let _guard = span.enter();
    }

    assert_eq!(storage.get_spans("global-session").map(|s| s.len()), Some(1));
}

#[test]
fn log_format_parses_case_insensitively() {
    assert_eq!("JSON".parse::<crate::LogFormat>().unwrap(), crate::LogFormat::Json);
    assert_eq!("pretty".parse::<crate::LogFormat>().unwrap(), crate::LogFormat::Pretty);
    assert!("xml".parse::<crate::LogFormat>().is_err());
}
