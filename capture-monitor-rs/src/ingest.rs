//! Batch ingestion of data capture files
//!
//! An invocation names a capture file, optionally with its records inline.
//! Each record is normalized and emitted as a trace on its own; one bad
//! record never stops the batch. Once the batch is done the new traces are
//! evaluated.

use log::{error, info};
use serde_json::Value;

use crate::capture::record::json_type_name;
use crate::capture::{normalize, NormalizedEvent, RawCaptureRecord};
use crate::emitter::{TraceEmitter, TraceSource};
use crate::error::{Result, ServiceError};
use crate::evaluation::{EvaluationDispatcher, EvaluationReport};
use crate::services::storage::ObjectStore;

/// Only files with this suffix are processed
pub const JSONL_SUFFIX: &str = ".jsonl";

/// Where the records of a batch come from
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
    /// Records supplied in the invocation
    Inline(Vec<Value>),
    /// Records read from the named object
    Object,
}

/// A resolved invocation payload
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPayload {
    pub bucket: String,
    pub key: String,
    pub source: RecordSource,
}

impl InvocationPayload {
    /// Resolve a payload of one of the shapes
    /// `{records, s3_bucket, s3_key}`, `{s3_key, s3_bucket}` or `{bucket, key}`.
    pub fn from_value(payload: &Value, default_bucket: &str) -> Result<Self> {
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
        let bucket_or_default = |name: &str| field(name).unwrap_or_else(|| default_bucket.to_string());

        if let Some(records) = payload.get("records").filter(|r| !r.is_null()) {
            let records = records.as_array().cloned().ok_or_else(|| {
                ServiceError::validation(format!(
                    "'records' must be an array, got {}",
                    json_type_name(records)
                ))
            })?;

            return Ok(Self {
                bucket: bucket_or_default("s3_bucket"),
                key: field("s3_key").unwrap_or_default(),
                source: RecordSource::Inline(records),
            });
        }

        if payload.get("s3_key").is_some() {
            return Ok(Self {
                bucket: bucket_or_default("s3_bucket"),
                key: field("s3_key").unwrap_or_default(),
                source: RecordSource::Object,
            });
        }

        Ok(Self {
            bucket: bucket_or_default("bucket"),
            key: field("key").unwrap_or_default(),
            source: RecordSource::Object,
        })
    }

    pub fn is_jsonl(&self) -> bool {
        self.key.ends_with(JSONL_SUFFIX)
    }
}

/// What happened to the evaluation step of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationStatus {
    Disabled,
    /// No trace matched the source key
    NoTraces,
    Completed(EvaluationReport),
    /// Both passes failed
    Failed(String),
}

/// Result of one batch
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Processed {
        key: String,
        total: usize,
        processed: usize,
        errors: usize,
        evaluation: EvaluationStatus,
    },
    /// The key does not name a JSONL file
    Skipped { key: String },
}

/// Drives capture records through normalization, emission and evaluation
pub struct BatchIngestor<'a> {
    objects: &'a dyn ObjectStore,
    emitter: TraceEmitter<'a>,
    evaluator: Option<EvaluationDispatcher<'a>>,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(objects: &'a dyn ObjectStore, emitter: TraceEmitter<'a>) -> Self {
        Self {
            objects,
            emitter,
            evaluator: None,
        }
    }

    /// Evaluate the batch's traces once all records are processed
    pub fn with_evaluation(mut self, evaluator: EvaluationDispatcher<'a>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Process one batch. Errors are returned only for failures that affect
    /// the whole batch: an unreadable object or no records at all.
    pub async fn ingest(&self, payload: InvocationPayload) -> Result<IngestOutcome> {
        if !payload.is_jsonl() {
            info!("Skipping non-JSONL file: {}", payload.key);
            return Ok(IngestOutcome::Skipped { key: payload.key });
        }

        info!("Processing file: s3://{}/{}", payload.bucket, payload.key);

        let records = match payload.source {
            RecordSource::Inline(records) => records,
            RecordSource::Object => self.fetch_records(&payload.bucket, &payload.key).await?,
        };

        if records.is_empty() {
            return Err(ServiceError::validation(format!(
                "No records found in s3://{}/{}",
                payload.bucket, payload.key
            )));
        }

        let records_total = records.len();
        info!("Found {} records to process", records_total);

        let source = TraceSource {
            bucket: &payload.bucket,
            key: &payload.key,
        };
        let mut processed = 0;
        let mut errors = 0;

        for (index, record) in records.into_iter().enumerate() {
            match self.process_record(record, source).await {
                Ok(event) => {
                    processed += 1;
                    if event.is_error() {
                        errors += 1;
                    }
                }
                Err(err) => error!("Error processing record {} of {}: {}", index + 1, payload.key, err),
            }
        }

        info!("Successfully processed {}/{} records", processed, records_total);

        let evaluation = self.evaluate(&payload.key).await;

        Ok(IngestOutcome::Processed {
            key: payload.key,
            total: records_total,
            processed,
            errors,
            evaluation,
        })
    }

    async fn process_record(&self, record: Value, source: TraceSource<'_>) -> Result<NormalizedEvent> {
        let record = match record {
            Value::String(line) => RawCaptureRecord::parse(&line)?,
            other => RawCaptureRecord::from_value(other)?,
        };

        let event = normalize(&record);
        self.emitter.emit(&event, source).await?;
        Ok(event)
    }

    async fn fetch_records(&self, bucket: &str, key: &str) -> Result<Vec<Value>> {
        let bytes = self.objects.get_object(bucket, key).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ServiceError::parsing(format!("s3://{}/{} is not valid UTF-8: {}", bucket, key, e))
        })?;

        parse_jsonl(&content)
    }

    async fn evaluate(&self, key: &str) -> EvaluationStatus {
        let Some(ref evaluator) = self.evaluator else {
            return EvaluationStatus::Disabled;
        };

        match evaluator.run(key).await {
            Ok(Some(report)) => EvaluationStatus::Completed(report),
            Ok(None) => EvaluationStatus::NoTraces,
            Err(err) => {
                error!("Error running evaluations for {}: {}", key, err);
                EvaluationStatus::Failed(err.to_string())
            }
        }
    }
}

/// Parse line-delimited JSON, skipping blank lines
pub fn parse_jsonl(content: &str) -> Result<Vec<Value>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                ServiceError::parsing(format!("Invalid JSON on line {}: {}", index + 1, e))
            })
        })
        .collect()
}
