//! Trace store data models
//!
//! Domain types used by the pipeline (`TraceRecord`, `StoredTrace`,
//! `Assessment`) and the MLflow REST wire types they are converted to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::truncate_string;

/// Tag holding the trace name on the tracking server
pub const TRACE_NAME_TAG: &str = "mlflow.traceName";

/// Span attribute holding the serialized span inputs
pub const SPAN_INPUTS_ATTRIBUTE: &str = "mlflow.spanInputs";

/// Span attribute holding the serialized span outputs
pub const SPAN_OUTPUTS_ATTRIBUTE: &str = "mlflow.spanOutputs";

/// Span attribute holding the span type
pub const SPAN_TYPE_ATTRIBUTE: &str = "mlflow.spanType";

/// Longest request/response preview the tracking server stores
pub const PREVIEW_MAX_CHARS: usize = 1000;

/// Final status of a span (and of its single-span trace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Ok,
    Error,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Ok => "OK",
            SpanStatus::Error => "ERROR",
        }
    }

    fn otel_code(&self) -> &'static str {
        match self {
            SpanStatus::Ok => "STATUS_CODE_OK",
            SpanStatus::Error => "STATUS_CODE_ERROR",
        }
    }
}

/// The one span carried by a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub name: String,
    pub span_type: String,
    pub inputs: Value,
    pub outputs: Value,
    pub attributes: BTreeMap<String, String>,
    pub status: SpanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A trace to append to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Trace name; the source file key, reused for later selection
    pub name: String,
    pub span: SpanRecord,
}

/// A trace read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrace {
    pub trace_id: String,
    pub name: String,
    pub inputs: Value,
    pub outputs: Value,
    pub attributes: BTreeMap<String, String>,
    pub status: SpanStatus,
}

/// Who produced an assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentSource {
    /// A deterministic function
    Code { id: String },
    /// A model-backed judge
    LlmJudge { model: String },
}

/// A scorer's verdict attached to a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub name: String,
    pub value: Option<Value>,
    pub rationale: Option<String>,
    /// Set when the scorer could not produce a value
    pub error: Option<String>,
    pub source: AssessmentSource,
}

// MLflow REST wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub experiment_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetExperimentResponse {
    pub experiment: ExperimentInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExperimentRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExperimentResponse {
    pub experiment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlflowExperimentLocation {
    pub experiment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLocation {
    #[serde(rename = "type")]
    pub location_type: String,
    pub mlflow_experiment: MlflowExperimentLocation,
}

impl TraceLocation {
    pub fn experiment(experiment_id: impl Into<String>) -> Self {
        Self {
            location_type: "MLFLOW_EXPERIMENT".to_string(),
            mlflow_experiment: MlflowExperimentLocation {
                experiment_id: experiment_id.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceInfo {
    pub trace_id: String,
    pub trace_location: TraceLocation,
    pub request_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<String>,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(default)]
    pub trace_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSpanStatus {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSpan {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    pub start_time_unix_nano: i64,
    pub end_time_unix_nano: i64,
    pub status: WireSpanStatus,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceData {
    pub spans: Vec<WireSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTrace {
    pub trace_info: TraceInfo,
    pub data: TraceData,
}

/// Span attributes as read back from a stored trace's data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredSpan {
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredTraceData {
    #[serde(default)]
    pub spans: Vec<StoredSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTraceRequest {
    pub trace: WireTrace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTracesRequest {
    pub locations: Vec<TraceLocation>,
    pub filter: String,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchTracesResponse {
    #[serde(default)]
    pub traces: Vec<TraceInfo>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAssessmentSource {
    pub source_type: String,
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAssessmentError {
    pub error_code: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireAssessmentError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAssessment {
    pub assessment_name: String,
    pub trace_id: String,
    pub source: WireAssessmentSource,
    pub feedback: WireFeedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub assessment: WireAssessment,
}

/// Serialize span inputs/outputs for the trace info previews, cut to [`PREVIEW_MAX_CHARS`]
pub fn to_preview(value: &Value) -> String {
    truncate_string(&value.to_string(), PREVIEW_MAX_CHARS)
}

/// Best-effort inverse of [`to_preview`]; cut or foreign previews come back as plain text
pub fn from_preview(preview: Option<&str>) -> Value {
    match preview {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}

impl TraceRecord {
    /// Convert to the REST payload, assigning server-side identifiers
    pub fn to_wire(&self, trace_id: &str, span_id: &str, experiment_id: &str) -> CreateTraceRequest {
        let span = &self.span;
        let duration = span.end_time - span.start_time;

        let mut tags = BTreeMap::new();
        tags.insert(TRACE_NAME_TAG.to_string(), self.name.clone());

        let mut attributes: BTreeMap<String, Value> = span
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        attributes.insert(SPAN_INPUTS_ATTRIBUTE.to_string(), Value::String(span.inputs.to_string()));
        attributes.insert(SPAN_OUTPUTS_ATTRIBUTE.to_string(), Value::String(span.outputs.to_string()));
        attributes.insert(SPAN_TYPE_ATTRIBUTE.to_string(), Value::String(span.span_type.clone()));

        let trace_info = TraceInfo {
            trace_id: trace_id.to_string(),
            trace_location: TraceLocation::experiment(experiment_id),
            request_time: span.start_time.to_rfc3339(),
            execution_duration: Some(format!("{:.3}s", duration.num_milliseconds() as f64 / 1000.0)),
            state: span.status.as_str().to_string(),
            request_preview: Some(to_preview(&span.inputs)),
            response_preview: Some(to_preview(&span.outputs)),
            trace_metadata: span.attributes.clone(),
            tags,
        };

        let wire_span = WireSpan {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            name: span.name.clone(),
            start_time_unix_nano: span.start_time.timestamp_nanos_opt().unwrap_or_default(),
            end_time_unix_nano: span.end_time.timestamp_nanos_opt().unwrap_or_default(),
            status: WireSpanStatus {
                code: span.status.otel_code().to_string(),
                message: String::new(),
            },
            attributes,
        };

        CreateTraceRequest {
            trace: WireTrace {
                trace_info,
                data: TraceData { spans: vec![wire_span] },
            },
        }
    }
}

impl From<TraceInfo> for StoredTrace {
    fn from(info: TraceInfo) -> Self {
        let status = if info.state.eq_ignore_ascii_case("ERROR") {
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };

        Self {
            name: info.tags.get(TRACE_NAME_TAG).cloned().unwrap_or_default(),
            inputs: from_preview(info.request_preview.as_deref()),
            outputs: from_preview(info.response_preview.as_deref()),
            attributes: info.trace_metadata,
            trace_id: info.trace_id,
            status,
        }
    }
}

/// A span attribute that holds serialized JSON
fn span_value(span: &StoredSpan, attribute: &str) -> Option<Value> {
    match span.attributes.get(attribute)? {
        Value::String(text) => Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))),
        other => Some(other.clone()),
    }
}

impl StoredTrace {
    /// Replace the preview-derived inputs and outputs with the full span values
    pub fn with_span_data(mut self, data: &StoredTraceData) -> Self {
        if let Some(span) = data.spans.first() {
            if let Some(inputs) = span_value(span, SPAN_INPUTS_ATTRIBUTE) {
                self.inputs = inputs;
            }
            if let Some(outputs) = span_value(span, SPAN_OUTPUTS_ATTRIBUTE) {
                self.outputs = outputs;
            }
        }
        self
    }
}

impl Assessment {
    pub fn to_wire(&self, trace_id: &str) -> CreateAssessmentRequest {
        let source = match &self.source {
            AssessmentSource::Code { id } => WireAssessmentSource {
                source_type: "CODE".to_string(),
                source_id: id.clone(),
            },
            AssessmentSource::LlmJudge { model } => WireAssessmentSource {
                source_type: "LLM_JUDGE".to_string(),
                source_id: model.clone(),
            },
        };

        let error = self.error.as_ref().map(|message| WireAssessmentError {
            error_code: "SCORER_ERROR".to_string(),
            error_message: message.clone(),
        });

        CreateAssessmentRequest {
            assessment: WireAssessment {
                assessment_name: self.name.clone(),
                trace_id: trace_id.to_string(),
                source,
                feedback: WireFeedback {
                    value: self.value.clone(),
                    error,
                },
                rationale: self.rationale.clone(),
            },
        }
    }
}
