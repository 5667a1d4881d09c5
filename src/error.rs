//! Error types and handling for the snowtrip service

use thiserror::Error;

use crate::routing::RoutingError;

/// Main error type for the snowtrip service
#[derive(Error, Debug)]
pub enum SnowtripError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Weather provider communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Unknown resort or other missing resource
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Routing provider errors, see [`RoutingError`]
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Request exceeded its time budget
    #[error("Timed out: {message}")]
    Timeout { message: String },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

/// Coarse error category used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Timeout,
    Upstream,
}

impl SnowtripError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            SnowtripError::Validation { .. } => ErrorCategory::Validation,
            SnowtripError::NotFound { .. } => ErrorCategory::NotFound,
            SnowtripError::Timeout { .. } => ErrorCategory::Timeout,
            _ => ErrorCategory::Upstream,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SnowtripError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            SnowtripError::Api { .. } => {
                "Unable to reach the weather provider. Please try again later.".to_string()
            }
            SnowtripError::Validation { message }
            | SnowtripError::NotFound { message }
            | SnowtripError::Timeout { message } => message.clone(),
            SnowtripError::Routing(err) => err.to_string(),
            SnowtripError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            SnowtripError::General { message } => message.clone(),
        }
    }
}

impl From<anyhow::Error> for SnowtripError {
    fn from(err: anyhow::Error) -> Self {
        SnowtripError::General {
            message: format!("{err:#}"),
        }
    }
}
