//! In-process trace store

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Assessment, StoredTrace, TraceRecord, TraceStore};
use crate::error::{Result, ServiceError};
use crate::util::generate_id;

/// Trace store that keeps traces and assessments in memory
#[derive(Debug, Default)]
pub struct InMemoryTraceStore {
    traces: Mutex<Vec<StoredTrace>>,
    assessments: Mutex<Vec<(String, Assessment)>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored trace, in insertion order
    pub fn traces(&self) -> Vec<StoredTrace> {
        self.traces.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Snapshot of every logged assessment with its trace id
    pub fn assessments(&self) -> Vec<(String, Assessment)> {
        self.assessments.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn log_trace(&self, trace: &TraceRecord) -> Result<String> {
        let trace_id = format!("tr-{}", generate_id());
        let stored = StoredTrace {
            trace_id: trace_id.clone(),
            name: trace.name.clone(),
            inputs: trace.span.inputs.clone(),
            outputs: trace.span.outputs.clone(),
            attributes: trace.span.attributes.clone(),
            status: trace.span.status,
        };

        self.traces
            .lock()
            .map_err(|_| ServiceError::internal("trace store lock poisoned"))?
            .push(stored);

        Ok(trace_id)
    }

    async fn search_traces(&self, name: &str) -> Result<Vec<StoredTrace>> {
        let traces = self
            .traces
            .lock()
            .map_err(|_| ServiceError::internal("trace store lock poisoned"))?;

        Ok(traces.iter().filter(|t| t.name == name).cloned().collect())
    }

    async fn log_assessment(&self, trace_id: &str, assessment: &Assessment) -> Result<()> {
        let known = self
            .traces
            .lock()
            .map_err(|_| ServiceError::internal("trace store lock poisoned"))?
            .iter()
            .any(|t| t.trace_id == trace_id);

        if !known {
            return Err(ServiceError::not_found(format!("trace {}", trace_id)));
        }

        self.assessments
            .lock()
            .map_err(|_| ServiceError::internal("trace store lock poisoned"))?
            .push((trace_id.to_string(), assessment.clone()));

        Ok(())
    }
}
