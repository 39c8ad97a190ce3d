//! Approval Models
//!
//! Requests, responses, scopes and the per-invocation state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Breadth of an approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalScope {
    /// This invocation only. Never persisted.
    Once,
    /// Every invocation of the tool within one session.
    Session,
    /// Every invocation of the tool in any session.
    Global,
}

impl ApprovalScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Session => "session",
            Self::Global => "global",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "once" => Some(Self::Once),
            "session" => Some(Self::Session),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt to invoke a tool, handed to the approval strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Generated per request; used to route the answer back.
    pub request_id: String,
    pub tool_name: String,
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ApprovalRequest {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            params,
            context: None,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }

    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }
}

/// Decision returned by an approval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    /// Only meaningful when `approved` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ApprovalScope>,
}

impl ApprovalResponse {
    pub fn approve(scope: Option<ApprovalScope>) -> Self {
        Self {
            approved: true,
            scope,
        }
    }

    pub fn approve_once() -> Self {
        Self::approve(Some(ApprovalScope::Once))
    }

    pub fn deny() -> Self {
        Self {
            approved: false,
            scope: None,
        }
    }
}

/// States an invocation passes through in the approval gate.
///
/// `Requested -> CheckGlobal -> {ApprovedAuto | CheckSession}
///  -> {ApprovedAuto | Prompt} -> {ApprovedOnce | ApprovedSession | ApprovedGlobal | Denied}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Requested,
    CheckGlobal,
    CheckSession,
    Prompt,
    /// Approved by a persisted decision, no prompt.
    ApprovedAuto,
    ApprovedOnce,
    ApprovedSession,
    ApprovedGlobal,
    Denied,
}

impl ApprovalState {
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            Self::ApprovedAuto | Self::ApprovedOnce | Self::ApprovedSession | Self::ApprovedGlobal
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_approved() || *self == Self::Denied
    }
}

/// A persisted auto-approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoApprovedTool {
    pub id: String,
    pub tool_name: String,
    /// `None` for a global decision.
    pub session_id: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl AutoApprovedTool {
    pub fn scope(&self) -> ApprovalScope {
        match self.session_id {
            Some(_) => ApprovalScope::Session,
            None => ApprovalScope::Global,
        }
    }
}
