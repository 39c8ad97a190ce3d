//! Tool Call Context
//!
//! 1. `ExecutionContext` trait - Read-only identity of the running session
//! 2. `ToolContext` - Concrete per-call context handed to `ToolExecutable::execute`
//!
//! Tools receive a `ToolContext` and cannot mutate session state. The approval
//! gate reads the session id from it to look up session-scoped decisions, and
//! passes the context through to the real tool unchanged.

use std::collections::BTreeMap;

use serde_json::Value;

// ============================================================================
// ExecutionContext Trait
// ============================================================================

/// Base execution context providing immutable session information.
pub trait ExecutionContext: Send + Sync {
    /// Session identifier, if the call belongs to a conversation.
    fn session_id(&self) -> Option<&str>;

    /// Name of the agent issuing the call.
    fn agent_name(&self) -> &str;

    /// Optional execution tag for categorization (e.g., "chat", "task").
    fn execution_tag(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// ToolContext
// ============================================================================

/// Context for a single tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolContext {
    session_id: Option<String>,
    agent_name: String,
    execution_tag: Option<String>,
    /// Unique identifier for this specific tool call.
    tool_call_id: String,
    /// Free-form call metadata supplied by the agent runtime.
    metadata: BTreeMap<String, Value>,
}

impl ToolContext {
    /// Create a new ToolContext bound to a session.
    pub fn new(
        session_id: impl Into<String>,
        agent_name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            agent_name: agent_name.into(),
            execution_tag: None,
            tool_call_id: tool_call_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a ToolContext that belongs to no session.
    pub fn detached(agent_name: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            session_id: None,
            agent_name: agent_name.into(),
            execution_tag: None,
            tool_call_id: tool_call_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the execution tag.
    pub fn with_execution_tag(mut self, tag: impl Into<String>) -> Self {
        self.execution_tag = Some(tag.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Look up a metadata entry.
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// JSON summary of the call context, used as the `context` of an approval request.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "session_id": self.session_id,
            "agent_name": self.agent_name,
            "execution_tag": self.execution_tag,
            "tool_call_id": self.tool_call_id,
            "metadata": self.metadata,
        })
    }
}

impl ExecutionContext for ToolContext {
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn execution_tag(&self) -> Option<&str> {
        self.execution_tag.as_deref()
    }
}

// ============================================================================
// Tests
// ============================================================================
