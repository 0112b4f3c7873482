//! Error mapping for remote services
//!
//! Converts MLflow tracking server and judge endpoint error bodies
//! to the normalized ServiceError type.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

/// Service name used for the MLflow tracking server
pub const TRACKING_SERVICE: &str = "mlflow";

/// Service name used for the judge model endpoint
pub const JUDGE_SERVICE: &str = "judge";

/// Map an MLflow REST error (`{"error_code": ..., "message": ...}`) to a ServiceError
pub fn map_mlflow_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = TRACKING_SERVICE.to_string();

    let error_code = json.get("error_code").and_then(|c| c.as_str());
    if let Some(code) = error_code {
        context.error_code = Some(code.to_string());
    }

    let message = json
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown MLflow error");

    match error_code {
        Some("RESOURCE_DOES_NOT_EXIST") => ServiceError::not_found(message),
        Some("RESOURCE_ALREADY_EXISTS") | Some("INVALID_PARAMETER_VALUE") => {
            ServiceError::validation(message)
        }
        Some("PERMISSION_DENIED") => ServiceError::authorization(message),
        Some("REQUEST_LIMIT_EXCEEDED") => ServiceError::rate_limit(message),
        _ => map_status(status, message),
    }
}

/// Map an OpenAI-compatible judge endpoint error to a ServiceError
pub fn map_judge_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = JUDGE_SERVICE.to_string();

    // Gateways answer either `{"error": {...}}` or `{"detail": "..."}`
    let message = if let Some(error) = json.get("error") {
        if let Some(error_type) = error.get("type").and_then(|t| t.as_str()) {
            context.add("error_type", error_type);
        }
        if let Some(code) = error.get("code").and_then(|c| c.as_str()) {
            context.error_code = Some(code.to_string());
        }
        error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("Unknown judge error")
    } else {
        json.get("detail")
            .or_else(|| json.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown judge error")
    };

    map_status(status, message)
}

/// Map a generic HTTP error to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match context.service.as_str() {
            TRACKING_SERVICE => return map_mlflow_error(status, &json, context),
            JUDGE_SERVICE => return map_judge_error(status, &json, context),
            _ => {
                let message = json
                    .get("message")
                    .or_else(|| json.get("error"))
                    .and_then(|m| m.as_str())
                    .unwrap_or(body);
                return map_status(status, message);
            }
        }
    }

    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    };

    map_status(status, message)
}

fn map_status(status: StatusCode, message: impl Into<String>) -> ServiceError {
    let message = message.into();
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::timeout(message),
        StatusCode::BAD_REQUEST => ServiceError::validation(message),
        _ => ServiceError::service(message),
    }
}

/// Determine if an HTTP status code indicates a transient failure
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}
