//! Error handling for the capture monitor
//!
//! This module provides the crate-wide error type:
//! - Categorizes errors by type (network, auth, rate limit, storage, etc.)
//! - Adds context (service, status code, server error code) to errors
//! - Maps tracking server and judge endpoint error bodies to normalized variants
//! - Provides a convenient Result type alias

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

const UNKNOWN_SERVICE: &str = "unknown";

/// Result type for capture monitor operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the capture monitor
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (permission issues)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Errors reported by a remote service
    #[error("Service error: {0}")]
    Service(String),

    /// Request or payload validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response or record parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Scorer or evaluation run errors
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

/// Generates one lowercase constructor per message-carrying variant
macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $name(message: impl Into<String>) -> Self {
                ServiceError::$variant(message.into())
            }
        )*
    };
}

impl ServiceError {
    constructors! {
        network => Network,
        authentication => Authentication,
        authorization => Authorization,
        rate_limit => RateLimit,
        service => Service,
        validation => Validation,
        parsing => Parsing,
        configuration => Configuration,
        timeout => Timeout,
        internal => Internal,
        not_found => NotFound,
        storage => Storage,
        evaluation => Evaluation,
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// Service-specific error code (e.g. `RESOURCE_DOES_NOT_EXIST`) if available
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, inner } => {
                context.error_code.as_deref().or_else(|| inner.error_code())
            }
            _ => None,
        }
    }

    /// Name of the service that produced the error, if known
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, inner } if context.service == UNKNOWN_SERVICE => {
                inner.service_name()
            }
            ServiceError::WithContext { context, .. } => Some(&context.service),
            _ => None,
        }
    }

    /// HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// The innermost error with all context layers removed
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Whether the underlying failure is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network(_) => true,
            ServiceError::Timeout(_) => true,
            ServiceError::RateLimit(_) => true,
            ServiceError::WithContext { inner, .. } => inner.is_retryable(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ServiceError::NotFound(_))
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Service-specific error code
    pub error_code: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: UNKNOWN_SERVICE.to_string(),
            status_code: None,
            error_code: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Classify transport-level reqwest failures
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let classified = match () {
            _ if err.is_timeout() => ServiceError::timeout(format!("Request timed out: {}", err)),
            _ if err.is_connect() => ServiceError::network(format!("Connection error: {}", err)),
            _ if err.is_decode() => ServiceError::parsing(format!("Response decode error: {}", err)),
            _ if err.is_request() || err.is_builder() => {
                ServiceError::validation(format!("Invalid request: {}", err))
            }
            _ => ServiceError::internal(format!("HTTP client error: {}", err)),
        };

        let mut context = ErrorContext::for_service("http_client");
        context.status_code = err.status().map(|s| s.as_u16());
        if let Some(url) = err.url() {
            context.endpoint = Some(url.path().to_string());
        }

        classified.with_context(context)
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
