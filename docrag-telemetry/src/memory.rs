use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Id, Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Span field that groups captured spans.
pub const SESSION_FIELD: &str = "session.id";

/// Data for a captured span
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    #[serde(rename = "span_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "parent_span_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub session_id: String,

    // Nanoseconds since the Unix epoch
    pub start_time: u128,
    pub end_time: u128,

    pub attributes: HashMap<String, serde_json::Value>,
    pub events: Vec<EventData>,
    pub status: SpanStatus,
}

impl SpanData {
    /// Whether an event with this exact message was logged inside the span.
    pub fn has_event(&self, message: &str) -> bool {
        self.events.iter().any(|e| e.message == message)
    }
}

/// A log event recorded inside a span.
#[derive(Debug, Clone, Serialize)]
pub struct EventData {
    pub level: String,
    pub message: String,
    pub fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    /// At least one `ERROR` event was logged inside the span.
    Error,
}

/// Shared storage for captured spans, keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct SharedTraceStorage {
    spans: Arc<RwLock<HashMap<String, Vec<SpanData>>>>,
}

impl SharedTraceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans closed so far for `session_id`, in close order.
    pub fn get_spans(&self, session_id: &str) -> Option<Vec<SpanData>> {
        self.spans.read().ok()?.get(session_id).cloned()
    }

    pub fn add_span(&self, session_id: String, span: SpanData) {
        if let Ok(mut spans) = self.spans.write() {
            spans.entry(session_id).or_default().push(span);
        }
    }

    /// Session ids with at least one captured span.
    pub fn sessions(&self) -> Vec<String> {
        self.spans.read().map(|spans| spans.keys().cloned().collect()).unwrap_or_default()
    }

    /// Drop everything captured for `session_id`.
    pub fn remove(&self, session_id: &str) -> Option<Vec<SpanData>> {
        self.spans.write().ok()?.remove(session_id)
    }
}

/// A tracing layer that captures session-scoped spans in memory
pub struct InMemoryTraceLayer {
    storage: Arc<SharedTraceStorage>,
}

impl InMemoryTraceLayer {
    pub fn new(storage: Arc<SharedTraceStorage>) -> Self {
        Self { storage }
    }
}

#[derive(Clone)]
struct SpanFields(HashMap<String, serde_json::Value>);

#[derive(Clone, Default)]
struct SpanEvents(Vec<EventData>);

#[derive(Clone, Copy)]
struct StartTime(u128);

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl<S> Layer<S> for InMemoryTraceLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        // Inherit the session from the parent span
        if !fields.contains_key(SESSION_FIELD) {
            if let Some(parent) = span.parent() {
                if let Some(value) =
                    parent.extensions().get::<SpanFields>().and_then(|f| f.0.get(SESSION_FIELD))
                {
                    fields.insert(SESSION_FIELD.to_string(), value.clone());
                }
            }
        }

        let mut extensions = span.extensions_mut();
        extensions.insert(StartTime(now_nanos()));
        extensions.insert(SpanFields(fields));
        extensions.insert(SpanEvents::default());
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.event_span(event) else { return };

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;
        let message = match fields.remove("message") {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let mut extensions = span.extensions_mut();
        if let Some(events) = extensions.get_mut::<SpanEvents>() {
            events.0.push(EventData {
                level: event.metadata().level().to_string(),
                message,
                fields,
            });
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let extensions = span.extensions();

        let fields = extensions.get::<SpanFields>().map(|f| f.0.clone()).unwrap_or_default();
        let Some(session_id) = fields.get(SESSION_FIELD).and_then(|v| v.as_str()).map(String::from)
        else {
            return; // Not session-scoped
        };

        let events = extensions.get::<SpanEvents>().map(|e| e.0.clone()).unwrap_or_default();
        let error = Level::ERROR.to_string();
        let status = if events.iter().any(|e| e.level == error) {
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };

        let span_data = SpanData {
            id: format!("{:016x}", id.into_u64()),
            name: span.metadata().name().to_string(),
            parent_id: span.parent().map(|p| format!("{:016x}", p.id().into_u64())),
            session_id: session_id.clone(),
            start_time: extensions.get::<StartTime>().map_or(0, |s| s.0),
            end_time: now_nanos(),
            attributes: fields,
            events,
            status,
        };

        self.storage.add_span(session_id, span_data);
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
