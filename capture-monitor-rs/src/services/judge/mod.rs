//! Judge model clients
//!
//! Model-backed scorers send their prompts through [`JudgeModel`]. The
//! production client speaks the OpenAI-compatible chat completions API,
//! which Bedrock access gateways expose for Anthropic models.

mod models;
pub use models::*;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::JudgeConfig;
use crate::error::mapping::JUDGE_SERVICE;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, join_url, parse_error_response, UserAgent};

/// A model that answers judge prompts with raw text
#[async_trait]
pub trait JudgeModel: Send + Sync {
    async fn complete(&self, request: &JudgeRequest) -> Result<String>;
}

/// Judge client for OpenAI-compatible chat completion endpoints
pub struct ChatJudgeClient {
    http_client: Client,
    config: JudgeConfig,
}

impl std::fmt::Debug for ChatJudgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatJudgeClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl ChatJudgeClient {
    pub fn new(config: JudgeConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_component("judge-client")),
            Some(config.timeout()),
        )?;

        Ok(Self { http_client, config })
    }

    /// Send a chat completion request
    pub async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let endpoint = "chat/completions";
        let url = join_url(&self.config.base_url, endpoint);
        debug!("Sending judge request to {} for model {}", url, request.model);

        let mut builder = self.http_client.post(&url).json(request);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(parse_error_response(JUDGE_SERVICE, endpoint, response).await);
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Failed to parse judge response: {}", e)))
    }
}

#[async_trait]
impl JudgeModel for ChatJudgeClient {
    async fn complete(&self, request: &JudgeRequest) -> Result<String> {
        let response = self.chat_completion(&ChatCompletionRequest::from(request)).await?;

        match response.choices.into_iter().next() {
            Some(choice) => choice
                .message
                .content
                .ok_or_else(|| ServiceError::parsing("Empty completion response")),
            None => Err(ServiceError::parsing("No completion choices returned")),
        }
    }
}
