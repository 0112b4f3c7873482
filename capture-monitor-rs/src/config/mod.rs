//! Configuration management
//!
//! Configuration is resolved once at process start from a [`ConfigProvider`]
//! (environment variables in production, in-memory values in tests) into
//! typed objects that are passed explicitly to every component.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServiceError};

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a required, non-empty string value
    fn get_required(&self, key: &str) -> Result<String> {
        let value = self.get_string(key)?;
        if value.trim().is_empty() {
            return Err(ServiceError::configuration(format!("Configuration value is empty: {}", key)));
        }
        Ok(value)
    }

    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get an optional, non-empty string value
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_string(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_optional(key).unwrap_or_else(|| default.to_string())
    }

    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "MLFLOW", "JUDGE")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for tests or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Generation parameters shared by every model-backed scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
    pub anthropic_version: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 512,
            top_p: 0.9,
            stop_sequences: vec!["}".to_string()],
            anthropic_version: Some("bedrock-2023-05-31".to_string()),
        }
    }
}

/// Connection settings for the MLflow tracking server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Base URI of the tracking server
    pub tracking_uri: String,

    /// Experiment that receives the traces
    pub experiment_name: String,

    /// Bearer token, when the server requires one
    pub token: Option<String>,

    pub timeout_seconds: u64,
}

impl TrackingConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            tracking_uri: provider.get_required("mlflow_tracking_uri")?,
            experiment_name: provider.get_required("mlflow_experiment_name")?,
            token: provider.get_optional("mlflow_tracking_token"),
            timeout_seconds: provider.get_int_or("mlflow_timeout_seconds", 30).max(1) as u64,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ServiceConfig for TrackingConfig {
    fn validate(&self) -> Result<()> {
        Url::parse(&self.tracking_uri).map_err(|e| {
            ServiceError::configuration(format!("Invalid MLflow tracking URI {}: {}", self.tracking_uri, e))
        })?;

        if self.experiment_name.trim().is_empty() {
            return Err(ServiceError::configuration("MLflow experiment name is required"));
        }

        Ok(())
    }
}

/// Connection settings for the judge model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Base URL of the OpenAI-compatible endpoint (e.g. a Bedrock access gateway)
    pub base_url: String,

    pub api_key: Option<String>,

    pub timeout_seconds: u64,
}

impl JudgeConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            base_url: provider.get_required("judge_base_url")?,
            api_key: provider.get_optional("judge_api_key"),
            timeout_seconds: provider.get_int_or("judge_timeout_seconds", 60).max(1) as u64,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ServiceConfig for JudgeConfig {
    fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid judge base URL {}: {}", self.base_url, e))
        })?;
        Ok(())
    }
}

/// Everything the processor needs, resolved once at process start
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tracking: TrackingConfig,

    /// Name of the SageMaker endpoint whose capture files are processed
    pub endpoint_name: String,

    /// Model identifier used by every model-backed scorer
    pub judge_model_id: String,

    /// Bucket used when the invocation payload does not name one
    pub data_capture_bucket: String,

    pub evaluation_enabled: bool,

    /// Delay before the second evaluation pass
    pub evaluation_retry_delay: Duration,

    /// Present when evaluation is enabled
    pub judge: Option<JudgeConfig>,

    pub generation: GenerationParams,
}

impl MonitorConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let tracking = TrackingConfig::from_provider(provider)?;
        let endpoint_name = provider.get_required("sagemaker_endpoint_name")?;
        let judge_model_id = provider.get_required("bedrock_model_id")?;
        let data_capture_bucket = provider.get_required("data_capture_bucket")?;

        let evaluation_enabled = provider.get_bool_or("evaluation_enabled", true);
        let retry_delay_ms = provider.get_int_or("evaluation_retry_delay_ms", 0).max(0) as u64;

        let judge = if evaluation_enabled {
            Some(JudgeConfig::from_provider(provider)?)
        } else {
            None
        };

        let config = Self {
            tracking,
            endpoint_name,
            judge_model_id,
            data_capture_bucket,
            evaluation_enabled,
            evaluation_retry_delay: Duration::from_millis(retry_delay_ms),
            judge,
            generation: GenerationParams::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&EnvConfigProvider::new())
    }
}

impl ServiceConfig for MonitorConfig {
    fn validate(&self) -> Result<()> {
        self.tracking.validate()?;

        if let Some(ref judge) = self.judge {
            judge.validate()?;
        }

        if self.evaluation_enabled && self.judge.is_none() {
            return Err(ServiceError::configuration(
                "Judge endpoint configuration is required when evaluation is enabled",
            ));
        }

        Ok(())
    }
}
