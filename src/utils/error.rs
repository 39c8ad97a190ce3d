//! Error Handling
//!
//! Unified error types for the extension host.
//! Uses thiserror for ergonomic error definitions.

use extension_host_core::CoreError;
use thiserror::Error;

/// A single handler failure collected during hook dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Extension that owns the failing handler
    pub extension_id: String,
    /// Error message returned (or panic payload) from the handler
    pub message: String,
}

impl std::fmt::Display for HookFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.extension_id, self.message)
    }
}

fn join_failures(failures: &[HookFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Host-wide error type
#[derive(Error, Debug)]
pub enum HostError {
    /// Malformed extension metadata at registration
    #[error("Validation error: {0}")]
    Validation(String),

    /// An extension with the same id is already registered
    #[error("Extension '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Framework or inter-extension version constraint unmet
    #[error(
        "Dependency '{dependency}' of extension '{extension}' is unsatisfied: requires {required}, found {}",
        .actual.as_deref().unwrap_or("nothing")
    )]
    DependencyUnsatisfied {
        extension: String,
        dependency: String,
        required: String,
        actual: Option<String>,
    },

    /// The activation graph contains a cycle
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// An extension's own activate/deactivate callback failed
    #[error("Extension '{extension}' lifecycle callback failed: {message}")]
    ActivationFailed { extension: String, message: String },

    /// One or more hook handlers failed; every handler still ran
    #[error(
        "Hook '{hook}' failed in {} handler(s): {}",
        .failures.len(),
        join_failures(.failures)
    )]
    HookExecution {
        hook: String,
        failures: Vec<HookFailure>,
    },

    /// The approval gate declined a tool invocation
    #[error("Execution denied: tool '{tool_name}' was not approved")]
    ExecutionDenied { tool_name: String },

    /// Decision store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors surfaced from tool execution
    #[error(transparent)]
    Tool(#[from] CoreError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for host errors
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<HostError> for String {
    fn from(err: HostError) -> String {
        err.to_string()
    }
}
