//! Decision Store
//!
//! Durable keyed lookup for persisted approval scopes. A decision without a
//! session id is global.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::approval::models::AutoApprovedTool;
use crate::utils::error::HostResult;

/// Storage for persisted approval decisions.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// True if `tool_name` is approved globally or, when `session_id` is
    /// given, for that session. Global is checked first.
    async fn is_tool_auto_approved(&self, tool_name: &str, session_id: Option<&str>)
        -> HostResult<bool>;

    /// Persist a decision; an absent `session_id` means global. Idempotent:
    /// returns the id of the existing entry if there is one.
    async fn add_auto_approved_tool(&self, tool_name: &str, session_id: Option<&str>)
        -> HostResult<String>;

    /// Global entries when `session_id` is absent, otherwise that session's entries.
    async fn get_auto_approved_tools(&self, session_id: Option<&str>)
        -> HostResult<Vec<AutoApprovedTool>>;

    /// Remove one entry. The global entry and session entries are independent.
    /// Removing an absent entry is a no-op.
    async fn remove_auto_approved_tool(&self, tool_name: &str, session_id: Option<&str>)
        -> HostResult<()>;
}

/// Encoding of the optional session id used as part of the storage key.
pub(crate) fn session_key(session_id: Option<&str>) -> String {
    session_id.unwrap_or_default().to_string()
}

/// In-process store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct InMemoryDecisionStore {
    entries: RwLock<BTreeMap<(String, String), AutoApprovedTool>>,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn is_tool_auto_approved(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<bool> {
        let entries = self.entries.read().await;
        if entries.contains_key(&(tool_name.to_string(), String::new())) {
            return Ok(true);
        }
        Ok(match session_id {
            Some(session) => entries.contains_key(&(tool_name.to_string(), session.to_string())),
            None => false,
        })
    }

    async fn add_auto_approved_tool(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<String> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry((tool_name.to_string(), session_key(session_id)))
            .or_insert_with(|| AutoApprovedTool {
                id: Uuid::new_v4().to_string(),
                tool_name: tool_name.to_string(),
                session_id: session_id.map(str::to_string),
                created_at: chrono::Utc::now().to_rfc3339(),
            });
        Ok(entry.id.clone())
    }

    async fn get_auto_approved_tools(
        &self,
        session_id: Option<&str>,
    ) -> HostResult<Vec<AutoApprovedTool>> {
        let key = session_key(session_id);
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|((_, session), _)| *session == key)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn remove_auto_approved_tool(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&(tool_name.to_string(), session_key(session_id)));
        Ok(())
    }
}
