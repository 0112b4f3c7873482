//! Evaluation of emitted traces
//!
//! After a batch is ingested, the traces named after its source key are
//! scored by the standard [`ScorerPanel`]. The whole run is retried once on
//! failure ([`RetryConfig::two_pass`]); the second failure is returned.

pub mod scorers;
pub mod verdict;

pub use scorers::{Heuristic, InstructedJudge, PrebuiltKind, Scorer, ScorerPanel};
pub use verdict::{parse_verdict, Verdict};

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::GenerationParams;
use crate::error::Result;
use crate::resilience::{RetryConfig, RetryExecutor};
use crate::services::judge::JudgeModel;
use crate::services::tracking::{Assessment, StoredTrace, TraceStore};
use crate::util::measure_time_async;

/// Assessments logged for one trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceFeedback {
    pub trace_id: String,
    pub assessments: Vec<Assessment>,
}

/// Outcome of one successful evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub traces: Vec<TraceFeedback>,
    /// Per scorer, the number of traces that received each value
    pub histogram: BTreeMap<String, BTreeMap<String, usize>>,
    /// Assessments that carry an error instead of a value
    pub scorer_errors: usize,
}

impl EvaluationReport {
    fn record(&mut self, trace_id: &str, assessments: Vec<Assessment>) {
        for assessment in &assessments {
            let bucket = match assessment.value {
                Some(serde_json::Value::String(ref s)) => s.clone(),
                Some(ref value) => value.to_string(),
                None => {
                    self.scorer_errors += 1;
                    "error".to_string()
                }
            };

            *self
                .histogram
                .entry(assessment.name.clone())
                .or_default()
                .entry(bucket)
                .or_insert(0) += 1;
        }

        self.traces.push(TraceFeedback {
            trace_id: trace_id.to_string(),
            assessments,
        });
    }

    pub fn assessment_count(&self) -> usize {
        self.traces.iter().map(|t| t.assessments.len()).sum()
    }
}

/// Runs the scorer panel over the traces of one source key
pub struct EvaluationDispatcher<'a> {
    traces: &'a dyn TraceStore,
    judge: &'a dyn JudgeModel,
    model_id: &'a str,
    params: &'a GenerationParams,
    retry: RetryConfig,
}

impl<'a> EvaluationDispatcher<'a> {
    pub fn new(
        traces: &'a dyn TraceStore,
        judge: &'a dyn JudgeModel,
        model_id: &'a str,
        params: &'a GenerationParams,
    ) -> Self {
        Self {
            traces,
            judge,
            model_id,
            params,
            retry: RetryConfig::two_pass(Duration::ZERO),
        }
    }

    /// Delay before the second pass
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry = RetryConfig::two_pass(delay);
        self
    }

    /// Score every trace named `selector`.
    ///
    /// Returns `Ok(None)` without calling any scorer when no trace matches.
    pub async fn run(&self, selector: &str) -> Result<Option<EvaluationReport>> {
        info!("Running evaluations on traces from {}", selector);

        let traces = self.traces.search_traces(selector).await?;
        if traces.is_empty() {
            warn!("No traces found for {}", selector);
            return Ok(None);
        }

        info!("Found {} traces to evaluate", traces.len());
        let panel = ScorerPanel::standard(self.model_id, self.params);
        let executor = RetryExecutor::new(self.retry.clone());

        // Shared across passes so a retry never logs an assessment twice
        let logged = Mutex::new(HashSet::new());
        let (result, elapsed) = measure_time_async(|| {
            executor.execute(|| self.evaluate_pass(&panel, &traces, &logged))
        })
        .await;
        let report = result?;

        info!(
            "Evaluations completed for {}: {} assessments on {} traces in {:?}",
            selector,
            report.assessment_count(),
            report.traces.len(),
            elapsed
        );
        Ok(Some(report))
    }

    /// One pass of `panel` over `traces`.
    ///
    /// Every trace is scored before any assessment is logged, so a scorer
    /// failure leaves the store untouched.
    pub async fn evaluate(&self, panel: &ScorerPanel, traces: &[StoredTrace]) -> Result<EvaluationReport> {
        self.evaluate_pass(panel, traces, &Mutex::new(HashSet::new())).await
    }

    async fn evaluate_pass(
        &self,
        panel: &ScorerPanel,
        traces: &[StoredTrace],
        logged: &Mutex<HashSet<(String, String)>>,
    ) -> Result<EvaluationReport> {
        let mut scored = Vec::with_capacity(traces.len());
        for trace in traces {
            let mut assessments = Vec::with_capacity(panel.len());
            for scorer in panel.scorers() {
                assessments.push(scorer.score(trace, self.judge).await?);
            }
            scored.push((trace.trace_id.as_str(), assessments));
        }

        let mut report = EvaluationReport::default();
        for (trace_id, assessments) in scored {
            for assessment in &assessments {
                let key = (trace_id.to_string(), assessment.name.clone());
                if logged.lock().await.contains(&key) {
                    debug!("Assessment {} already logged for {}", assessment.name, trace_id);
                    continue;
                }

                self.traces.log_assessment(trace_id, assessment).await?;
                logged.lock().await.insert(key);
            }
            report.record(trace_id, assessments);
        }

        Ok(report)
    }
}
