//! Judge endpoint data models
//!
//! Request/response shapes of the OpenAI-compatible chat completions API,
//! plus the provider-neutral [`JudgeRequest`] used by scorers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GenerationParams;

/// A single judge prompt, independent of the wire format
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    /// Model identifier or `provider:/model-id` URI
    pub model: String,

    /// System instructions, if any
    pub system: Option<String>,

    /// The rendered judge prompt
    pub prompt: String,

    pub params: GenerationParams,
}

/// A model identifier of the form `provider:/model-id`, or a bare model id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub provider: Option<String>,
    pub model_id: String,
}

impl ModelUri {
    pub fn parse(uri: &str) -> Self {
        match uri.split_once(":/") {
            Some((provider, model_id)) if !provider.is_empty() && !provider.contains('.') => Self {
                provider: Some(provider.to_string()),
                model_id: model_id.trim_start_matches('/').to_string(),
            },
            _ => Self {
                provider: None,
                model_id: uri.to_string(),
            },
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provider {
            Some(ref provider) => write!(f, "{}:/{}", provider, self.model_id),
            None => write!(f, "{}", self.model_id),
        }
    }
}

/// A chat message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatCompletionRequest {
    pub model: String,

    pub messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences that end generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Passed through to Anthropic models served by Bedrock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<String>,
}

impl From<&JudgeRequest> for ChatCompletionRequest {
    fn from(request: &JudgeRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        let params = &request.params;
        Self {
            model: ModelUri::parse(&request.model).model_id,
            messages,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            max_tokens: Some(params.max_tokens),
            stop: if params.stop_sequences.is_empty() {
                None
            } else {
                Some(params.stop_sequences.clone())
            },
            anthropic_version: params.anthropic_version.clone(),
        }
    }
}

/// A message in a chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: String,
    pub content: Option<String>,
}

/// A chat completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_uri_strips_provider() {
        let uri = ModelUri::parse("bedrock:/global.anthropic.claude-sonnet-4-20250514-v1:0");
        assert_eq!(uri.provider.as_deref(), Some("bedrock"));
        assert_eq!(uri.model_id, "global.anthropic.claude-sonnet-4-20250514-v1:0");
        assert_eq!(uri.to_string(), "bedrock:/global.anthropic.claude-sonnet-4-20250514-v1:0");
    }

    #[test]
    fn test_bare_model_id_is_kept() {
        let uri = ModelUri::parse("anthropic.claude-3-haiku-20240307-v1:0");
        assert!(uri.provider.is_none());
        assert_eq!(uri.model_id, "anthropic.claude-3-haiku-20240307-v1:0");
    }

    #[test]
    fn test_request_carries_generation_params() {
        let request = JudgeRequest {
            model: "bedrock:/model-a".to_string(),
            system: Some("be strict".to_string()),
            prompt: "is this fluent?".to_string(),
            params: GenerationParams::default(),
        };

        let chat = ChatCompletionRequest::from(&request);
        assert_eq!(chat.model, "model-a");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.max_tokens, Some(512));
        assert_eq!(chat.stop, Some(vec!["}".to_string()]));
        assert_eq!(chat.anthropic_version.as_deref(), Some("bedrock-2023-05-31"));
    }
}
