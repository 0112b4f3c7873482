//! # Capture Monitor
//!
//! Turns model-serving data capture files into traces on an MLflow tracking
//! server and scores them with LLM judges.
//!
//! ## Pipeline
//!
//! - [`capture`]: decodes captured payloads and normalizes each record
//! - [`emitter`]: emits one single-span trace per normalized record
//! - [`ingest`]: resolves the batch source and drives records through the pipeline
//! - [`evaluation`]: scores the batch's traces with the standard scorer panel
//! - [`handler`]: invocation payload in, response payload out
//!
//! External systems (object storage, the trace store and the judge model)
//! sit behind traits in [`services`], each with an in-memory implementation.

pub mod capture;
pub mod config;
pub mod emitter;
pub mod error;
pub mod evaluation;
pub mod handler;
pub mod ingest;
pub mod resilience;
pub mod services;
pub mod util;

pub use config::{ConfigProvider, MonitorConfig, ServiceConfig};
pub use error::{ErrorContext, Result, ServiceError};
pub use handler::{handle_invocation, HandlerResponse, MonitorContext};
pub use ingest::{BatchIngestor, IngestOutcome, InvocationPayload};

#[cfg(test)]
mod tests;
