//! Invocation handling
//!
//! [`handle_invocation`] turns one invocation payload into the response
//! payload returned to the caller. Every failure that affects the whole batch
//! becomes a 500 response; nothing escapes as an error.

use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MonitorConfig;
use crate::emitter::TraceEmitter;
use crate::error::Result;
use crate::evaluation::EvaluationDispatcher;
use crate::ingest::{BatchIngestor, IngestOutcome, InvocationPayload};
use crate::services::judge::{ChatJudgeClient, JudgeModel};
use crate::services::storage::{ObjectStore, S3ObjectStore};
use crate::services::tracking::{MlflowTrackingClient, TraceStore};
use crate::util::{sanitize_for_logging, truncate_string};

pub const PROCESSED_MESSAGE: &str = "Successfully processed data capture file";
pub const SKIPPED_MESSAGE: &str = "Skipped non-JSONL file";
pub const FAILED_MESSAGE: &str = "Error processing data capture file";

/// Longest event text written to the log
const MAX_LOGGED_EVENT_CHARS: usize = 2000;

/// Configuration and service clients shared by every invocation
#[derive(Clone)]
pub struct MonitorContext {
    pub config: MonitorConfig,
    pub objects: Arc<dyn ObjectStore>,
    pub traces: Arc<dyn TraceStore>,
    /// Absent when evaluation is disabled
    pub judge: Option<Arc<dyn JudgeModel>>,
}

impl MonitorContext {
    pub fn new(
        config: MonitorConfig,
        objects: Arc<dyn ObjectStore>,
        traces: Arc<dyn TraceStore>,
        judge: Option<Arc<dyn JudgeModel>>,
    ) -> Self {
        Self {
            config,
            objects,
            traces,
            judge,
        }
    }

    /// Build the production clients for `config`
    pub async fn from_config(config: MonitorConfig) -> Result<Self> {
        let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::from_env().await);
        let traces: Arc<dyn TraceStore> = Arc::new(MlflowTrackingClient::new(config.tracking.clone())?);

        let judge: Option<Arc<dyn JudgeModel>> = match config.judge {
            Some(ref judge_config) if config.evaluation_enabled => {
                Some(Arc::new(ChatJudgeClient::new(judge_config.clone())?))
            }
            _ => None,
        };

        info!(
            "Monitoring endpoint {} into experiment {} (evaluation {})",
            config.endpoint_name,
            config.tracking.experiment_name,
            if judge.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(config, objects, traces, judge))
    }

    pub async fn from_env() -> Result<Self> {
        Self::from_config(MonitorConfig::from_env()?).await
    }
}

/// Response body variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Processed {
        message: String,
        records_processed: usize,
        errors_found: usize,
        s3_key: String,
    },
    Skipped {
        message: String,
        s3_key: String,
    },
    Failed {
        message: String,
        error: String,
    },
}

/// Response payload: `{"statusCode": ..., "body": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: ResponseBody,
}

impl HandlerResponse {
    pub fn processed(key: String, records_processed: usize, errors_found: usize) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody::Processed {
                message: PROCESSED_MESSAGE.to_string(),
                records_processed,
                errors_found,
                s3_key: key,
            },
        }
    }

    pub fn skipped(key: String) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody::Skipped {
                message: SKIPPED_MESSAGE.to_string(),
                s3_key: key,
            },
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            status_code: 500,
            body: ResponseBody::Failed {
                message: FAILED_MESSAGE.to_string(),
                error: error.to_string(),
            },
        }
    }
}

/// Process one invocation payload
pub async fn handle_invocation(ctx: &MonitorContext, event: Value) -> HandlerResponse {
    info!(
        "Received event: {}",
        truncate_string(&sanitize_for_logging(&event.to_string()), MAX_LOGGED_EVENT_CHARS)
    );

    let payload = match InvocationPayload::from_value(&event, &ctx.config.data_capture_bucket) {
        Ok(payload) => payload,
        Err(err) => {
            error!("{}: {}", FAILED_MESSAGE, err);
            return HandlerResponse::failed(err);
        }
    };

    let config = &ctx.config;
    let emitter = TraceEmitter::new(ctx.traces.as_ref(), &config.endpoint_name);
    let mut ingestor = BatchIngestor::new(ctx.objects.as_ref(), emitter);

    match ctx.judge {
        Some(ref judge) if config.evaluation_enabled => {
            let dispatcher = EvaluationDispatcher::new(
                ctx.traces.as_ref(),
                judge.as_ref(),
                &config.judge_model_id,
                &config.generation,
            )
            .with_retry_delay(config.evaluation_retry_delay);
            ingestor = ingestor.with_evaluation(dispatcher);
        }
        _ if config.evaluation_enabled => warn!("Evaluation is enabled but no judge model is configured"),
        _ => {}
    }

    match ingestor.ingest(payload).await {
        Ok(IngestOutcome::Processed {
            key, processed, errors, ..
        }) => HandlerResponse::processed(key, processed, errors),
        Ok(IngestOutcome::Skipped { key }) => HandlerResponse::skipped(key),
        Err(err) => {
            error!("{}: {}", FAILED_MESSAGE, err);
            HandlerResponse::failed(err)
        }
    }
}
