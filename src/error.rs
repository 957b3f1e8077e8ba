use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Network errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // Caller errors, rejected before any network call
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Repository error: {0}")]
    Repository(#[from] crate::repositories::RepositoryError),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Broad error classes, used to pick a log level and decide propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad configuration, never fixed by trying again
    Configuration,
    /// Network failure, non-2xx status or timeout
    Transport,
    /// Caller supplied structurally invalid input
    Input,
    /// Anything else
    Internal,
}

impl Error {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Http(_) | Self::Timeout { .. } => ErrorCategory::Transport,
            Self::InvalidInput { .. } => ErrorCategory::Input,
            Self::Io(_) | Self::Serde(_) | Self::Repository(_) | Self::Provider(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Errors the caller caused and should be told about directly
    pub const fn is_client_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Input)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<crate::client::providers::ProviderError> for Error {
    fn from(err: crate::client::providers::ProviderError) -> Self {
        use crate::client::providers::ProviderError;

        match err {
            ProviderError::InvalidQuery { field, reason } => Self::InvalidInput { field, reason },
            ProviderError::Timeout(timeout) => Self::Timeout { timeout },
            ProviderError::Configuration(reason) => Self::InvalidConfig {
                field: "capability".to_string(),
                reason,
            },
            other => Self::Provider(other.to_string()),
        }
    }
}
