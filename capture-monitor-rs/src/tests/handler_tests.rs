//! End-to-end tests for invocation handling

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::MonitorConfig;
    use crate::handler::{handle_invocation, HandlerResponse, ResponseBody, FAILED_MESSAGE, PROCESSED_MESSAGE};
    use crate::tests::fixtures::*;

    #[tokio::test]
    async fn test_inline_records_response() {
        let harness = TestHarness::new();
        let event = json!({"records": clean_and_throttled(), "s3_bucket": BUCKET, "s3_key": KEY});

        let response = handle_invocation(&harness.ctx, event).await;

        assert_eq!(response, HandlerResponse::processed(KEY.to_string(), 2, 1));
        assert_eq!(harness.objects.reads(), 0);
        assert_eq!(harness.traces.assessments().len(), 14);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({
                "statusCode": 200,
                "body": {
                    "message": PROCESSED_MESSAGE,
                    "records_processed": 2,
                    "errors_found": 1,
                    "s3_key": KEY
                }
            })
        );
    }

    #[tokio::test]
    async fn test_pointer_reads_default_bucket() {
        let harness = TestHarness::new();
        harness.objects.insert(BUCKET, KEY, to_jsonl(&clean_and_throttled()));

        let response = handle_invocation(&harness.ctx, json!({"s3_key": KEY})).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(harness.objects.reads(), 1);
        assert_eq!(harness.traces.traces()[0].attributes["s3_bucket_name"], BUCKET);
    }

    #[tokio::test]
    async fn test_skip_response_does_not_evaluate() {
        let harness = TestHarness::new();

        let response = handle_invocation(&harness.ctx, json!({"bucket": BUCKET, "key": "capture.json.gz"})).await;

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({"statusCode": 200, "body": {"message": "Skipped non-JSONL file", "s3_key": "capture.json.gz"}})
        );
        assert_eq!(harness.judge.calls(), 0);
        assert_eq!(harness.objects.reads(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_500() {
        let harness = TestHarness::new();

        let response = handle_invocation(&harness.ctx, json!({"bucket": BUCKET, "key": KEY})).await;

        assert_eq!(response.status_code, 500);
        match response.body {
            ResponseBody::Failed { message, error } => {
                assert_eq!(message, FAILED_MESSAGE);
                assert!(error.contains(KEY));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_evaluation_failure_keeps_200() {
        let harness = TestHarness::with_judge(ScriptedJudge::failing_first(usize::MAX));
        let event = json!({"records": clean_and_throttled(), "s3_key": KEY});

        let response = handle_invocation(&harness.ctx, event).await;

        assert_eq!(response, HandlerResponse::processed(KEY.to_string(), 2, 1));
        assert_eq!(harness.judge.calls(), 2);
        assert!(harness.traces.assessments().is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_disabled() {
        let mut provider = provider();
        provider.set("evaluation_enabled", "false");
        let config = MonitorConfig::from_provider(&provider).unwrap();
        let harness = TestHarness::build(config, ScriptedJudge::new());

        let response = handle_invocation(&harness.ctx, json!({"records": clean_and_throttled(), "s3_key": KEY})).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(harness.judge.calls(), 0);
        assert_eq!(harness.traces.traces().len(), 2);
    }

    #[test]
    fn test_response_body_round_trips_variants() {
        let skipped: HandlerResponse = serde_json::from_value(json!({
            "statusCode": 200,
            "body": {"message": "Skipped non-JSONL file", "s3_key": "a.txt"}
        }))
        .unwrap();
        assert_eq!(skipped, HandlerResponse::skipped("a.txt".to_string()));

        let failed = HandlerResponse::failed("boom");
        assert_eq!(
            serde_json::to_value(&failed).unwrap()["body"],
            json!({"message": FAILED_MESSAGE, "error": "boom"})
        );
    }
}
