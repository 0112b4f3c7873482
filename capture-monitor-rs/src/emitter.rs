//! Trace emission
//!
//! Every normalized event becomes one trace named after its source file,
//! holding a single span with the request as inputs and the decoded response
//! as outputs.

use std::collections::BTreeMap;

use chrono::Utc;
use log::debug;
use serde_json::{json, Map, Value};

use crate::capture::NormalizedEvent;
use crate::error::Result;
use crate::services::tracking::{SpanRecord, SpanStatus, TraceRecord, TraceStore};

/// Span type recorded for inference spans
pub const SPAN_TYPE: &str = "UNKNOWN";

/// Where the events of a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSource<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
}

/// Emits normalized events to a trace store
pub struct TraceEmitter<'a> {
    store: &'a dyn TraceStore,
    endpoint_name: &'a str,
}

impl<'a> TraceEmitter<'a> {
    pub fn new(store: &'a dyn TraceStore, endpoint_name: &'a str) -> Self {
        Self { store, endpoint_name }
    }

    /// Append one trace for `event`, returning the new trace id
    pub async fn emit(&self, event: &NormalizedEvent, source: TraceSource<'_>) -> Result<String> {
        let trace = build_trace(event, source, self.endpoint_name);
        let trace_id = self.store.log_trace(&trace).await?;

        debug!("Logged trace {} for event {}", trace_id, event.event_id);
        Ok(trace_id)
    }
}

/// The trace for one event; the source key doubles as the trace name
pub fn build_trace(event: &NormalizedEvent, source: TraceSource<'_>, endpoint_name: &str) -> TraceRecord {
    let start_time = Utc::now();

    let mut attributes = BTreeMap::new();
    // The bucket the records were read from, which may differ from the configured capture bucket
    attributes.insert("s3_bucket_name".to_string(), source.bucket.to_string());
    attributes.insert("s3_file_key".to_string(), source.key.to_string());
    attributes.insert("sagemaker_endpoint_name".to_string(), endpoint_name.to_string());
    attributes.insert("event_id".to_string(), event.event_id.clone());
    attributes.insert("inference_time".to_string(), event.timestamp.clone());
    attributes.insert("status_code".to_string(), event.status_code_or_default().to_string());

    let status = if event.is_error() { SpanStatus::Error } else { SpanStatus::Ok };

    TraceRecord {
        name: source.key.to_string(),
        span: SpanRecord {
            name: source.key.to_string(),
            span_type: SPAN_TYPE.to_string(),
            inputs: span_inputs(&event.request),
            outputs: event.response.clone(),
            attributes,
            status,
            start_time,
            end_time: Utc::now(),
        },
    }
}

/// `{prompt, parameters}` taken from the request's `inputs` and `parameters`
fn span_inputs(request: &Value) -> Value {
    let (prompt, parameters) = match request {
        Value::Object(fields) => (
            fields.get("inputs").cloned().unwrap_or_else(|| json!("")),
            fields.get("parameters").cloned().unwrap_or_else(|| Value::Object(Map::new())),
        ),
        Value::String(text) => (Value::String(text.clone()), Value::Object(Map::new())),
        _ => (json!(""), Value::Object(Map::new())),
    };

    json!({ "prompt": prompt, "parameters": parameters })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(request: Value, status_code: Option<i64>, is_error: Option<bool>) -> NormalizedEvent {
        NormalizedEvent {
            timestamp: "2025-11-03T10:15:00Z".to_string(),
            event_id: "evt-1".to_string(),
            request,
            response: json!({"generated_text": "ok"}),
            status_code,
            is_error,
            error_message: None,
        }
    }

    const SOURCE: TraceSource<'static> = TraceSource {
        bucket: "capture-bucket",
        key: "qwen3/AllTraffic/2025/11/03/10/capture.jsonl",
    };

    #[test]
    fn test_trace_carries_attributes() {
        let trace = build_trace(
            &event(json!({"inputs": "hello", "parameters": {"max_new_tokens": 64}}), Some(200), Some(false)),
            SOURCE,
            "qwen3-endpoint",
        );

        assert_eq!(trace.name, SOURCE.key);
        assert_eq!(trace.span.status, SpanStatus::Ok);
        assert_eq!(trace.span.inputs, json!({"prompt": "hello", "parameters": {"max_new_tokens": 64}}));
        assert_eq!(trace.span.outputs, json!({"generated_text": "ok"}));

        let attrs = &trace.span.attributes;
        assert_eq!(attrs["s3_bucket_name"], "capture-bucket");
        assert_eq!(attrs["s3_file_key"], SOURCE.key);
        assert_eq!(attrs["sagemaker_endpoint_name"], "qwen3-endpoint");
        assert_eq!(attrs["event_id"], "evt-1");
        assert_eq!(attrs["inference_time"], "2025-11-03T10:15:00Z");
        assert_eq!(attrs["status_code"], "200");
    }

    #[test]
    fn test_missing_response_defaults_to_ok() {
        let trace = build_trace(&event(json!({}), None, None), SOURCE, "ep");

        assert_eq!(trace.span.status, SpanStatus::Ok);
        assert_eq!(trace.span.attributes["status_code"], "200");
        assert_eq!(trace.span.inputs, json!({"prompt": "", "parameters": {}}));
    }

    #[test]
    fn test_error_event_marks_span() {
        let trace = build_trace(&event(json!("raw prompt"), Some(429), Some(true)), SOURCE, "ep");

        assert_eq!(trace.span.status, SpanStatus::Error);
        assert_eq!(trace.span.attributes["status_code"], "429");
        assert_eq!(trace.span.inputs["prompt"], "raw prompt");
    }
}
