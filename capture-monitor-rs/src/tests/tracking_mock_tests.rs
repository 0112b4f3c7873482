//! Mock tests for the MLflow tracking client
//!
//! These tests use WireMock to simulate the MLflow REST API.

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::capture::{normalize, RawCaptureRecord};
    use crate::config::TrackingConfig;
    use crate::emitter::{build_trace, TraceSource};
    use crate::error::ServiceError;
    use crate::services::tracking::{
        Assessment, AssessmentSource, MlflowTrackingClient, SpanStatus, TraceRecord, TraceStore,
        PREVIEW_MAX_CHARS, SPAN_INPUTS_ATTRIBUTE, SPAN_OUTPUTS_ATTRIBUTE,
    };
    use crate::tests::fixtures::*;

    const EXPERIMENT: &str = "endpoint-monitoring";

    fn create_test_client(server: &MockServer, token: Option<&str>) -> MlflowTrackingClient {
        MlflowTrackingClient::new(TrackingConfig {
            tracking_uri: server.uri(),
            experiment_name: EXPERIMENT.to_string(),
            token: token.map(str::to_string),
            timeout_seconds: 5,
        })
        .expect("Failed to build MLflow client")
    }

    async fn mount_existing_experiment(server: &MockServer, experiment_id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/experiments/get-by-name"))
            .and(query_param("experiment_name", EXPERIMENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "experiment": {"experiment_id": experiment_id, "name": EXPERIMENT, "lifecycle_stage": "active"}
            })))
            .mount(server)
            .await;
    }

    fn throttled_trace() -> TraceRecord {
        let record = clean_and_throttled().remove(1);
        let event = normalize(&RawCaptureRecord::from_value(record).unwrap());
        build_trace(&event, TraceSource { bucket: BUCKET, key: KEY }, ENDPOINT)
    }

    #[tokio::test]
    async fn test_log_trace_uses_existing_experiment() {
        let server = MockServer::start().await;
        mount_existing_experiment(&server, "7").await;

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces"))
            .and(header("Authorization", "Bearer mlflow-token"))
            .and(body_partial_json(json!({
                "trace": {
                    "trace_info": {
                        "trace_location": {"type": "MLFLOW_EXPERIMENT", "mlflow_experiment": {"experiment_id": "7"}},
                        "state": "ERROR",
                        "tags": {"mlflow.traceName": KEY},
                        "trace_metadata": {"event_id": "evt-throttled", "status_code": "429"}
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, Some("mlflow-token"));
        let trace_id = client.log_trace(&throttled_trace()).await.unwrap();

        assert!(trace_id.starts_with("tr-"));
    }

    #[tokio::test]
    async fn test_missing_experiment_is_created_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/experiments/get-by-name"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "Could not find experiment with name 'endpoint-monitoring'"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/experiments/create"))
            .and(body_partial_json(json!({"name": EXPERIMENT})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"experiment_id": "12"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, None);
        assert_eq!(client.experiment_id().await.unwrap(), "12");
        assert_eq!(client.experiment_id().await.unwrap(), "12");
    }

    #[tokio::test]
    async fn test_search_follows_pages() {
        let server = MockServer::start().await;
        mount_existing_experiment(&server, "7").await;

        let info = |trace_id: &str, state: &str| {
            json!({
                "trace_id": trace_id,
                "trace_location": {"type": "MLFLOW_EXPERIMENT", "mlflow_experiment": {"experiment_id": "7"}},
                "request_time": "2025-11-03T10:15:01Z",
                "state": state,
                "request_preview": "{\"prompt\":\"hi\",\"parameters\":{}}",
                "response_preview": "{\"generated_text\":\"Hello there\"}",
                "trace_metadata": {"event_id": trace_id},
                "tags": {"mlflow.traceName": KEY}
            })
        };

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces/search"))
            .and(body_partial_json(json!({"page_token": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"traces": [info("tr-2", "ERROR")]})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces/search"))
            .and(body_partial_json(json!({
                "filter": format!("name = '{}'", KEY),
                "max_results": 100,
                "locations": [{"type": "MLFLOW_EXPERIMENT", "mlflow_experiment": {"experiment_id": "7"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "traces": [info("tr-1", "OK")],
                "next_page_token": "page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, None);
        let traces = client.search_traces(KEY).await.unwrap();

        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].trace_id, "tr-1");
        assert_eq!(traces[0].name, KEY);
        assert_eq!(traces[0].status, SpanStatus::Ok);
        assert_eq!(traces[0].inputs, json!({"prompt": "hi", "parameters": {}}));
        assert_eq!(traces[0].outputs, json!({"generated_text": "Hello there"}));
        assert_eq!(traces[1].status, SpanStatus::Error);
    }

    #[tokio::test]
    async fn test_long_response_preview_is_capped() {
        let server = MockServer::start().await;
        mount_existing_experiment(&server, "7").await;

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let long_text = "word ".repeat(2000);
        let record = json_record(
            "evt-long",
            &prompt("Write a long essay"),
            &json!({"generated_text": long_text}),
            Some("application/json"),
        );
        let event = normalize(&RawCaptureRecord::from_value(record).unwrap());
        let trace = build_trace(&event, TraceSource { bucket: BUCKET, key: KEY }, ENDPOINT);

        let client = create_test_client(&server, None);
        client.log_trace(&trace).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent = requests
            .iter()
            .find(|r| r.url.path() == "/api/3.0/mlflow/traces")
            .expect("trace was posted");
        let body: Value = serde_json::from_slice(&sent.body).unwrap();

        let preview = body["trace"]["trace_info"]["response_preview"].as_str().unwrap();
        assert!(preview.chars().count() <= PREVIEW_MAX_CHARS);

        let outputs = body["trace"]["data"]["spans"][0]["attributes"][SPAN_OUTPUTS_ATTRIBUTE]
            .as_str()
            .unwrap();
        let outputs: Value = serde_json::from_str(outputs).unwrap();
        assert_eq!(outputs["generated_text"], json!(long_text));
    }

    #[tokio::test]
    async fn test_search_restores_full_span_values() {
        let server = MockServer::start().await;
        mount_existing_experiment(&server, "7").await;

        let long_text = "word ".repeat(2000);
        let outputs = json!({"generated_text": long_text});
        let cut_preview = crate::util::truncate_string(&outputs.to_string(), PREVIEW_MAX_CHARS);

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "traces": [{
                    "trace_id": "tr-long",
                    "trace_location": {"type": "MLFLOW_EXPERIMENT", "mlflow_experiment": {"experiment_id": "7"}},
                    "request_time": "2025-11-03T10:15:01Z",
                    "state": "OK",
                    "request_preview": "{\"prompt\":\"Write a long essay\",\"parameters\":{}}",
                    "response_preview": cut_preview,
                    "tags": {"mlflow.traceName": KEY}
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/get-trace-artifact"))
            .and(query_param("request_id", "tr-long"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spans": [{
                    "name": KEY,
                    "attributes": {
                        SPAN_INPUTS_ATTRIBUTE: "{\"prompt\":\"Write a long essay\",\"parameters\":{}}",
                        SPAN_OUTPUTS_ATTRIBUTE: outputs.to_string()
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, None);
        let traces = client.search_traces(KEY).await.unwrap();

        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].outputs, outputs);
        assert_eq!(traces[0].inputs["prompt"], "Write a long essay");
    }

    #[tokio::test]
    async fn test_log_assessment() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/3.0/mlflow/traces/tr-abc/assessments"))
            .and(body_partial_json(json!({
                "assessment": {
                    "assessment_name": "professional_tone",
                    "trace_id": "tr-abc",
                    "source": {"source_type": "LLM_JUDGE", "source_id": MODEL_ID},
                    "feedback": {"value": "yes"},
                    "rationale": "Courteous wording."
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"assessment": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, None);
        let assessment = Assessment {
            name: "professional_tone".to_string(),
            value: Some(json!("yes")),
            rationale: Some("Courteous wording.".to_string()),
            error: None,
            source: AssessmentSource::LlmJudge { model: MODEL_ID.to_string() },
        };

        client.log_assessment("tr-abc", &assessment).await.unwrap();
    }

    #[tokio::test]
    async fn test_permission_error_is_mapped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/experiments/get-by-name"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error_code": "PERMISSION_DENIED",
                "message": "User does not have permission to read experiments"
            })))
            .mount(&server)
            .await;

        let client = create_test_client(&server, None);
        let err = client.log_trace(&throttled_trace()).await.unwrap_err();

        assert!(matches!(err.root(), ServiceError::Authorization(_)));
        assert_eq!(err.error_code(), Some("PERMISSION_DENIED"));
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.service_name(), Some("mlflow"));
    }
}
