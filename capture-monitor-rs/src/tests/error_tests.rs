//! Tests for error classification and context

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::error::mapping::{map_http_error, JUDGE_SERVICE, TRACKING_SERVICE};
    use crate::error::{ErrorContext, ServiceError};

    #[test]
    fn test_status_mapping_for_tracking_server() {
        let cases = [
            (StatusCode::UNAUTHORIZED, "Authentication"),
            (StatusCode::FORBIDDEN, "Authorization"),
            (StatusCode::NOT_FOUND, "NotFound"),
            (StatusCode::TOO_MANY_REQUESTS, "RateLimit"),
            (StatusCode::BAD_REQUEST, "Validation"),
            (StatusCode::GATEWAY_TIMEOUT, "Timeout"),
            (StatusCode::INTERNAL_SERVER_ERROR, "Service"),
        ];

        for (status, expected) in cases {
            let mut context = ErrorContext::for_service(TRACKING_SERVICE);
            let err = map_http_error(status, r#"{"message": "boom"}"#, &mut context);
            let variant = format!("{:?}", err);
            assert!(variant.starts_with(expected), "{} mapped to {}", status, variant);
        }
    }

    #[test]
    fn test_mlflow_error_code_wins_over_status() {
        let mut context = ErrorContext::for_service(TRACKING_SERVICE);
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "No trace tr-1"}"#,
            &mut context,
        );

        assert!(err.is_not_found());
        assert_eq!(context.error_code.as_deref(), Some("RESOURCE_DOES_NOT_EXIST"));
    }

    #[test]
    fn test_judge_detail_body() {
        let mut context = ErrorContext::for_service(JUDGE_SERVICE);
        let err = map_http_error(StatusCode::UNAUTHORIZED, r#"{"detail": "Could not validate credentials"}"#, &mut context);

        assert!(matches!(err, ServiceError::Authentication(ref m) if m == "Could not validate credentials"));
    }

    #[test]
    fn test_context_layers() {
        let err = ServiceError::storage("bucket unreachable")
            .with_context(ErrorContext::for_service("s3").status_code(503).endpoint("s3://b/k"))
            .with_context_value("attempts", 2);

        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.service_name(), Some("s3"));
        assert!(matches!(err.root(), ServiceError::Storage(_)));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Storage error: bucket unreachable");
    }
}
