//! Trace store clients
//!
//! [`TraceStore`] is the seam between the pipeline and the tracking system:
//! traces are appended, searched by name and annotated with assessments.
//! [`MlflowTrackingClient`] talks to an MLflow tracking server over REST;
//! [`InMemoryTraceStore`] keeps everything in process.

mod memory;
mod models;

pub use memory::InMemoryTraceStore;
pub use models::*;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::TrackingConfig;
use crate::error::mapping::TRACKING_SERVICE;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, join_url, parse_error_response, UserAgent};
use crate::util::generate_id;

/// Page size used when searching traces
const SEARCH_PAGE_SIZE: u32 = 100;

/// Append-only access to the tracking system's traces
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Append a trace, returning its identifier
    async fn log_trace(&self, trace: &TraceRecord) -> Result<String>;

    /// All traces whose name equals `name`
    async fn search_traces(&self, name: &str) -> Result<Vec<StoredTrace>>;

    /// Attach an assessment to an existing trace
    async fn log_assessment(&self, trace_id: &str, assessment: &Assessment) -> Result<()>;
}

/// MLflow tracking server client
pub struct MlflowTrackingClient {
    http_client: Client,
    config: TrackingConfig,
    experiment_id: OnceCell<String>,
}

impl std::fmt::Debug for MlflowTrackingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowTrackingClient")
            .field("tracking_uri", &self.config.tracking_uri)
            .field("experiment_name", &self.config.experiment_name)
            .finish()
    }
}

impl MlflowTrackingClient {
    pub fn new(config: TrackingConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_component("mlflow-client")),
            Some(config.timeout()),
        )?;

        Ok(Self {
            http_client,
            config,
            experiment_id: OnceCell::new(),
        })
    }

    /// Experiment id for the configured experiment name, created on first use if missing
    pub async fn experiment_id(&self) -> Result<&str> {
        self.experiment_id
            .get_or_try_init(|| self.resolve_experiment())
            .await
            .map(String::as_str)
    }

    async fn resolve_experiment(&self) -> Result<String> {
        let name = self.config.experiment_name.as_str();
        let lookup = self
            .get::<GetExperimentResponse>(
                "api/2.0/mlflow/experiments/get-by-name",
                &[("experiment_name", name)],
            )
            .await;

        match lookup {
            Ok(response) => {
                debug!("Using MLflow experiment {} ({})", name, response.experiment.experiment_id);
                Ok(response.experiment.experiment_id)
            }
            Err(err) if err.is_not_found() => {
                info!("MLflow experiment {} not found, creating it", name);
                let created: CreateExperimentResponse = self
                    .post(
                        "api/2.0/mlflow/experiments/create",
                        &CreateExperimentRequest { name: name.to_string() },
                    )
                    .await?;
                Ok(created.experiment_id)
            }
            Err(err) => Err(err),
        }
    }

    /// Restore the full span inputs and outputs, which the previews may have cut
    async fn with_full_data(&self, trace: StoredTrace) -> Result<StoredTrace> {
        let lookup = self
            .get::<StoredTraceData>(
                "api/2.0/mlflow/get-trace-artifact",
                &[("request_id", trace.trace_id.as_str())],
            )
            .await;

        match lookup {
            Ok(data) => Ok(trace.with_span_data(&data)),
            Err(err) if err.is_not_found() => {
                debug!("No span data stored for {}, using previews", trace.trace_id);
                Ok(trace)
            }
            Err(err) => Err(err),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<R>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = join_url(&self.config.tracking_uri, endpoint);
        debug!("Sending request to MLflow: GET {}", url);

        let response = self.authorize(self.http_client.get(&url).query(query)).send().await?;
        self.read_response(endpoint, response).await
    }

    async fn post<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = join_url(&self.config.tracking_uri, endpoint);
        debug!("Sending request to MLflow: POST {}", url);

        let response = self.authorize(self.http_client.post(&url).json(body)).send().await?;
        self.read_response(endpoint, response).await
    }

    async fn read_response<R>(&self, endpoint: &str, response: reqwest::Response) -> Result<R>
    where
        R: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(parse_error_response(TRACKING_SERVICE, endpoint, response).await);
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(body).map_err(|e| {
            ServiceError::parsing(format!("Failed to parse MLflow response from {}: {}", endpoint, e))
        })
    }
}

/// Filter expression selecting traces by name
pub fn name_filter(name: &str) -> String {
    format!("name = '{}'", name.replace('\'', "\\'"))
}

#[async_trait]
impl TraceStore for MlflowTrackingClient {
    async fn log_trace(&self, trace: &TraceRecord) -> Result<String> {
        let experiment_id = self.experiment_id().await?;
        let trace_id = format!("tr-{}", generate_id());
        let span_id: String = generate_id().chars().take(16).collect();

        let request = trace.to_wire(&trace_id, &span_id, experiment_id);
        let _: Value = self.post("api/3.0/mlflow/traces", &request).await?;

        Ok(trace_id)
    }

    async fn search_traces(&self, name: &str) -> Result<Vec<StoredTrace>> {
        let experiment_id = self.experiment_id().await?.to_string();
        let mut traces = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = SearchTracesRequest {
                locations: vec![TraceLocation::experiment(experiment_id.clone())],
                filter: name_filter(name),
                max_results: SEARCH_PAGE_SIZE,
                page_token: page_token.take(),
            };

            let response: SearchTracesResponse = self.post("api/3.0/mlflow/traces/search", &request).await?;
            for info in response.traces {
                traces.push(self.with_full_data(StoredTrace::from(info)).await?);
            }

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(traces)
    }

    async fn log_assessment(&self, trace_id: &str, assessment: &Assessment) -> Result<()> {
        let endpoint = format!("api/3.0/mlflow/traces/{}/assessments", trace_id);
        let _: Value = self.post(&endpoint, &assessment.to_wire(trace_id)).await?;
        Ok(())
    }
}
