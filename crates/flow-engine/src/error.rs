//! Error types for the flow engine

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while running a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Structural problem with the graph or registry (no entry node, dangling edge, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A node's config payload could not be interpreted
    #[error("Invalid config for node '{node_id}': {message}")]
    InvalidNodeConfig { node_id: String, message: String },

    /// A condition expression failed to parse or evaluate
    #[error("Invalid condition expression: {expression} ({message})")]
    Expression { expression: String, message: String },

    /// A remote endpoint answered with a non-2xx status
    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    /// Transport-level HTTP failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Model provider returned an error or an unusable response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Live model call without a credential for the provider
    #[error("API key for {0} not configured")]
    MissingCredential(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid node config error
    pub fn invalid_config(node_id: &str, msg: impl Into<String>) -> Self {
        Self::InvalidNodeConfig {
            node_id: node_id.to_string(),
            message: msg.into(),
        }
    }

    /// Create an expression error naming the offending expression
    pub fn expression(expression: &str, msg: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.to_string(),
            message: msg.into(),
        }
    }

    /// Short machine-readable code for node error records
    pub fn code(&self) -> String {
        match self {
            Self::Configuration(_) => "CONFIGURATION".to_string(),
            Self::InvalidNodeConfig { .. } => "INVALID_CONFIG".to_string(),
            Self::Expression { .. } => "EXPRESSION".to_string(),
            Self::HttpStatus { status, .. } => format!("HTTP_{}", status),
            Self::Http(_) => "HTTP_TRANSPORT".to_string(),
            Self::Provider(_) => "PROVIDER".to_string(),
            Self::MissingCredential(_) => "MISSING_CREDENTIAL".to_string(),
            Self::Serialization(_) => "SERIALIZATION".to_string(),
            Self::Io(_) => "IO".to_string(),
        }
    }

    /// Technical detail from the underlying error source, if any
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::Expression { message, .. } => Some(message.clone()),
            _ => std::error::Error::source(self).map(|s| s.to_string()),
        }
    }
}
