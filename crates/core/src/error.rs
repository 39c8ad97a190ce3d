//! Core Error Types
//!
//! Errors surfaced by tools and the tool registry. The host crate has its own
//! richer `HostError`; tools only ever see this smaller set so that a tool body
//! never depends on the extension manager or the approval gate.

use thiserror::Error;

/// Core error type returned from tool execution.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The approval gate declined the invocation. The tool body never ran.
    #[error("Execution denied: tool '{tool_name}' was not approved")]
    ExecutionDenied { tool_name: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by the tool body itself
    #[error("Tool error: {0}")]
    Tool(String),

    /// Validation errors (bad arguments, schema mismatch)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create an execution-denied error for the given tool
    pub fn execution_denied(tool_name: impl Into<String>) -> Self {
        Self::ExecutionDenied {
            tool_name: tool_name.into(),
        }
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is an approval denial rather than a tool failure.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::ExecutionDenied { .. })
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
