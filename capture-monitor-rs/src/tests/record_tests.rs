//! Tests for capture record normalization

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::capture::{normalize, RawCaptureRecord, UNKNOWN_EVENT_ID};
    use crate::tests::fixtures::{base64_record, json_record, prompt};

    fn normalize_value(value: Value) -> crate::capture::NormalizedEvent {
        normalize(&RawCaptureRecord::from_value(value).unwrap())
    }

    #[test]
    fn test_explicit_code_is_error() {
        for (code, expected) in [(json!(429), 429), (json!(424), 424), (json!("503"), 503)] {
            let event = normalize_value(json_record(
                "evt-1",
                &prompt("hi"),
                &json!({"code": code, "message": "throttled"}),
                Some("application/json"),
            ));

            assert_eq!(event.is_error, Some(true));
            assert_eq!(event.status_code, Some(expected));
            assert_eq!(event.error_message.as_deref(), Some("throttled"));
        }
    }

    #[test]
    fn test_missing_content_type_is_error_with_default_status() {
        let event = normalize_value(base64_record(
            "evt-2",
            &prompt("hi"),
            r#"{"generated_text": "partial"}"#,
            None,
        ));

        assert_eq!(event.is_error, Some(true));
        assert_eq!(event.status_code, Some(500));
        assert_eq!(event.response, json!({"generated_text": "partial"}));
    }

    #[test]
    fn test_missing_content_type_on_text_response() {
        let event = normalize_value(base64_record("evt-3", &prompt("hi"), "model container crashed", None));

        assert_eq!(event.is_error, Some(true));
        assert_eq!(event.status_code, Some(500));
        assert_eq!(event.response, json!("model container crashed"));
    }

    #[test]
    fn test_normal_response_is_ok() {
        let event = normalize_value(json_record(
            "evt-4",
            &prompt("What is the capital of France?"),
            &json!([{"generated_text": "Paris."}]),
            Some("application/json"),
        ));

        assert_eq!(event.is_error, Some(false));
        assert_eq!(event.status_code, Some(200));
        assert_eq!(event.event_id, "evt-4");
        assert_eq!(event.timestamp, "2025-11-03T10:15:00Z");
        assert_eq!(event.request["inputs"], "What is the capital of France?");
        assert!(event.error_message.is_none());
    }

    #[test]
    fn test_missing_response_leaves_classification_unset() {
        let event = normalize_value(json!({
            "captureData": {
                "endpointInput": {"encoding": "JSON", "data": "{\"inputs\": \"hi\"}"}
            },
            "eventMetadata": {"eventId": "evt-5", "inferenceTime": "2025-11-03T10:16:00Z"}
        }));

        assert_eq!(event.status_code, None);
        assert_eq!(event.is_error, None);
        assert_eq!(event.response, json!({}));
        assert_eq!(event.status_code_or_default(), 200);
        assert!(!event.is_error());
    }

    #[test]
    fn test_malformed_record_is_tolerated() {
        let event = normalize_value(json!({
            "captureData": "not an object",
            "eventMetadata": {"eventId": 17}
        }));

        assert_eq!(event.event_id, UNKNOWN_EVENT_ID);
        assert!(!event.timestamp.is_empty());
        assert_eq!(event.request, json!({}));
        assert_eq!(event.is_error, None);
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let event = normalize_value(json!({}));

        assert_eq!(event.event_id, "unknown");
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }
}
