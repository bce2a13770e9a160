//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use crate::types::RefreshFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type RolegateResult<T> = Result<T, RolegateError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the session layer
#[derive(Error, Debug)]
pub enum RolegateError {
    /// Network failure reaching an endpoint. Never retried by this layer.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// The refresh endpoint failed; every waiter of the same flight sees the same value.
    #[error("Token refresh failed: {failure}")]
    Refresh {
        failure: RefreshFailure,
        context: ErrorContext,
    },

    /// A 401 came back for a request that had already been replayed once.
    #[error("Request to {url} rejected with HTTP {status} after token refresh")]
    RetryExhausted {
        status: u16,
        url: String,
        context: ErrorContext,
    },

    /// Unexpected non-success status surfaced by a typed helper such as `get_json`
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl RolegateError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            RolegateError::Transport { context, .. } => Some(context),
            RolegateError::Refresh { context, .. } => Some(context),
            RolegateError::RetryExhausted { context, .. } => Some(context),
            RolegateError::Status { context, .. } => Some(context),
            RolegateError::Storage { context, .. } => Some(context),
            RolegateError::Config { context, .. } => Some(context),
            RolegateError::Validation { context, .. } => Some(context),
            RolegateError::Timeout { context, .. } => Some(context),
            RolegateError::Internal { context, .. } => Some(context),
            RolegateError::Io(_) | RolegateError::Serialization(_) => None,
        }
    }

    /// Wrap a refresh failure with context
    pub fn refresh(failure: RefreshFailure, operation: &str) -> Self {
        RolegateError::Refresh {
            failure,
            context: ErrorContext::new("refresh_coordinator")
                .with_operation(operation)
                .with_suggestion("Clear the stored session and sign in again"),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            RolegateError::Transport { .. } => true,
            RolegateError::Timeout { .. } => true,
            RolegateError::Refresh { .. } => false,
            RolegateError::RetryExhausted { .. } => false,
            RolegateError::Config { .. } => false,
            RolegateError::Validation { .. } => false,
            _ => false,
        }
    }

    /// Whether the session is unusable and the caller should send the user to login
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            RolegateError::Refresh { .. } | RolegateError::RetryExhausted { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            RolegateError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            RolegateError::Config { .. } | RolegateError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            RolegateError::Refresh { .. } | RolegateError::RetryExhausted { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Session expired"
                );
            }
            RolegateError::Transport { .. } | RolegateError::Timeout { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or timeout error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::RolegateError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::RolegateError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the profile directory is writable"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::RolegateError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'rolegate config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::RolegateError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
