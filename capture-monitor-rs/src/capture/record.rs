//! Capture record normalization

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::decoder::decode_payload;
use crate::error::{Result, ServiceError};

/// Event id used when a record carries none
pub const UNKNOWN_EVENT_ID: &str = "unknown";

/// Status code assumed for error responses that do not carry a usable code
const DEFAULT_ERROR_STATUS: i64 = 500;

const OK_STATUS: i64 = 200;

/// A data capture record as written by the serving platform.
///
/// The record is kept as raw JSON and read leniently: missing or mistyped
/// fields read as absent instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCaptureRecord {
    value: Value,
}

/// One captured side of an inference call (`endpointInput` or `endpointOutput`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedPayload<'a> {
    pub encoding: Option<&'a str>,
    pub data: Option<&'a Value>,
    pub observed_content_type: Option<&'a str>,
}

impl<'a> CapturedPayload<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        let fields = value.as_object().filter(|m| !m.is_empty())?;

        Some(Self {
            encoding: fields.get("encoding").and_then(Value::as_str),
            data: fields.get("data").filter(|d| !d.is_null()),
            observed_content_type: fields.get("observedContentType").and_then(Value::as_str),
        })
    }

    /// Decoded payload; non-string data is passed through unchanged
    pub fn decode(&self) -> Value {
        match self.data {
            None => decode_payload("", self.encoding),
            Some(Value::String(data)) => decode_payload(data, self.encoding),
            Some(other) => other.clone(),
        }
    }
}

impl RawCaptureRecord {
    /// Wrap a JSON value; only objects are records
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ServiceError::validation(format!(
                "Capture record must be a JSON object, got {}",
                json_type_name(&value)
            )));
        }
        Ok(Self { value })
    }

    /// Parse one line of a capture file
    pub fn parse(line: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(line)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.value
            .get("eventMetadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.metadata_str("eventId")
    }

    pub fn inference_time(&self) -> Option<&str> {
        self.metadata_str("inferenceTime")
    }

    fn captured(&self, side: &str) -> Option<CapturedPayload<'_>> {
        self.value
            .get("captureData")
            .and_then(|c| c.get(side))
            .and_then(CapturedPayload::from_value)
    }

    pub fn endpoint_input(&self) -> Option<CapturedPayload<'_>> {
        self.captured("endpointInput")
    }

    pub fn endpoint_output(&self) -> Option<CapturedPayload<'_>> {
        self.captured("endpointOutput")
    }
}

/// A capture record reduced to what the trace emitter needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Inference time as recorded, or the normalization time when missing
    pub timestamp: String,
    pub event_id: String,
    pub request: Value,
    pub response: Value,
    /// Unset when the record has no response
    pub status_code: Option<i64>,
    /// Unset when the record has no response
    pub is_error: Option<bool>,
    /// The response's `message` when it carried an error code
    pub error_message: Option<String>,
}

impl NormalizedEvent {
    pub fn status_code_or_default(&self) -> i64 {
        self.status_code.unwrap_or(OK_STATUS)
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

struct Classification {
    status_code: i64,
    is_error: bool,
    error_message: Option<String>,
}

/// Normalize one capture record. Never fails; missing parts take defaults.
pub fn normalize(record: &RawCaptureRecord) -> NormalizedEvent {
    let timestamp = record
        .inference_time()
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let event_id = record.event_id().unwrap_or(UNKNOWN_EVENT_ID).to_string();

    let request = record
        .endpoint_input()
        .map(|input| input.decode())
        .unwrap_or_else(|| Value::Object(Map::new()));

    let mut event = NormalizedEvent {
        timestamp,
        event_id,
        request,
        response: Value::Object(Map::new()),
        status_code: None,
        is_error: None,
        error_message: None,
    };

    if let Some(output) = record.endpoint_output() {
        let response = output.decode();
        let classification = classify(&response, output.observed_content_type);

        event.response = response;
        event.status_code = Some(classification.status_code);
        event.is_error = Some(classification.is_error);
        event.error_message = classification.error_message;
    }

    event
}

/// An explicit `code` marks an error; so does a missing content type
fn classify(response: &Value, observed_content_type: Option<&str>) -> Classification {
    if let Some(code) = response.get("code") {
        let message = match response.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        return Classification {
            status_code: status_from_code(code),
            is_error: true,
            error_message: Some(message),
        };
    }

    if observed_content_type.is_none() {
        return Classification {
            status_code: DEFAULT_ERROR_STATUS,
            is_error: true,
            error_message: None,
        };
    }

    Classification {
        status_code: OK_STATUS,
        is_error: false,
        error_message: None,
    }
}

fn status_from_code(code: &Value) -> i64 {
    match code {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(DEFAULT_ERROR_STATUS),
        Value::String(s) => s.trim().parse().unwrap_or(DEFAULT_ERROR_STATUS),
        _ => DEFAULT_ERROR_STATUS,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
