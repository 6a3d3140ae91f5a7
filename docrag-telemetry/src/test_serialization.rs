use std::collections::HashMap;

use crate::memory::{EventData, SpanData, SpanStatus};

#[test]
fn test_span_data_serialization() {
    let span = SpanData {
        id: "00000000000000a1".to_string(),
        name: "rag.ingest".to_string(),
        parent_id: None,
        session_id: "3f1c".to_string(),
        start_time: 1234567890000000000,
        end_time: 1234567890000001000,
        attributes: HashMap::new(),
        events: vec![EventData {
            level: "INFO".to_string(),
            message: "document ingested".to_string(),
            fields: HashMap::new(),
        }],
        status: SpanStatus::Ok,
    };

    let json = serde_json::to_value(&span).unwrap();

    assert_eq!(json["span_id"], "00000000000000a1");
    assert_eq!(json["session_id"], "3f1c");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["events"][0]["message"], "document ingested");
    assert!(json.get("parent_span_id").is_none());
    assert!(json.get("id").is_none());
}
