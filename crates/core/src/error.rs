//! Error types for the TailorTalk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Run-level failures live in [`Error`]; each bounded context has its own enum.

use thiserror::Error;

/// The top-level error type for a single agent run.
///
/// Any of these aborts the run. Tool-level failures never appear here:
/// they are absorbed into tool-result text by [`crate::tool::Tool::invoke`].
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning service ---
    #[error("Reasoning service failure: {0}")]
    Provider(#[from] ProviderError),

    // --- Dispatch ---
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    // --- Control loop ---
    #[error("Agent loop exceeded {max_iterations} tool rounds without a final answer")]
    LoopExceeded { max_iterations: u32 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures raised inside a tool. Converted to text at the tool boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Debug, Clone, Error)]
pub enum CalendarError {
    #[error("Could not parse timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Calendar credentials error: {0}")]
    Credentials(String),

    #[error("Calendar authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Calendar API error {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Calendar request timed out: {0}")]
    Timeout(String),

    #[error("Calendar network error: {0}")]
    Network(String),

    #[error("Malformed calendar response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().starts_with("Reasoning service failure"));
    }

    #[test]
    fn loop_exceeded_names_the_limit() {
        let err = Error::LoopExceeded { max_iterations: 25 };
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn calendar_error_passes_through_tool_error() {
        let err: ToolError = CalendarError::InvalidTimestamp("tomorrow-ish".into()).into();
        assert_eq!(err.to_string(), "Could not parse timestamp 'tomorrow-ish'");
    }
}
