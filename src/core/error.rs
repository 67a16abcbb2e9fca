//! Unified error handling for the aggregation engine
//!
//! Every failure raised while resolving, invoking or joining calls is an
//! `AggregateError`. Only the executor turns these into a `Problem`.

use std::fmt;

/// Unified error types for the aggregation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Configuration-related errors
    Configuration(String),

    /// A service call needs a capability that was never registered
    ServiceNotRegistered { service: &'static str },

    /// A function or service capability failed
    Capability(String),

    /// A fallback ran but produced no substitute
    FallbackDeclined(String),

    /// Joined payload could not be converted to the response type
    Join(String),

    /// The surrounding execution was cancelled
    Cancelled,

    /// Validation errors
    Validation(String),

    /// Internal system errors
    Internal(String),
}

impl AggregateError {
    /// Shortcut for the most common failure raised by capabilities.
    pub fn capability(msg: impl Into<String>) -> Self {
        AggregateError::Capability(msg.into())
    }

    /// Whether a fallback may be offered this failure.
    ///
    /// Missing capabilities and bad configuration are fatal, and a cancelled
    /// execution has nobody left to substitute a value for.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AggregateError::Configuration(_)
                | AggregateError::ServiceNotRegistered { .. }
                | AggregateError::Cancelled
        )
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            AggregateError::ServiceNotRegistered { service } => {
                write!(f, "Service not registered: {service}")
            }
            AggregateError::Capability(msg) => write!(f, "{msg}"),
            AggregateError::FallbackDeclined(msg) => write!(f, "{msg}"),
            AggregateError::Join(msg) => write!(f, "Join failed: {msg}"),
            AggregateError::Cancelled => write!(f, "Execution cancelled"),
            AggregateError::Validation(msg) => write!(f, "Validation error: {msg}"),
            AggregateError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for AggregateError {}

impl From<serde_json::Error> for AggregateError {
    fn from(err: serde_json::Error) -> Self {
        AggregateError::Join(err.to_string())
    }
}

impl From<serde_yaml::Error> for AggregateError {
    fn from(err: serde_yaml::Error) -> Self {
        AggregateError::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AggregateError {
    fn from(err: validator::ValidationErrors) -> Self {
        AggregateError::Validation(err.to_string())
    }
}

/// Result type alias for aggregation operations
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> AggregateResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> AggregateResult<T> {
        self.map_err(|e| AggregateError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::AggregateError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::AggregateError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::AggregateError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::AggregateError::Internal(format!($fmt, $($arg)*))
    };
}
