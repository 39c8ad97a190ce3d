//! Approval Gate
//!
//! Authorization layer consulted before any tool executes. For each
//! invocation it checks a persisted global decision, then a persisted
//! session decision, then falls back to the approval strategy and persists
//! the scope the strategy chose.
//!
//! Decision store failures on this path are logged and never fatal: the
//! current call honors the strategy's answer, it just isn't remembered.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use extension_host_core::{
    CoreError, CoreResult, ExecutionContext, ToolContext, ToolDefinitionTrait, ToolExecutable,
    UnifiedTool,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::services::approval::models::{
    ApprovalRequest, ApprovalScope, ApprovalState, AutoApprovedTool,
};
use crate::services::approval::store::{session_key, DecisionStore};
use crate::services::approval::strategy::ApprovalStrategy;
use crate::utils::error::{HostError, HostResult};

/// Central approval gate shared by every wrapped tool.
pub struct ApprovalGate {
    store: Arc<dyn DecisionStore>,
    strategy: Arc<dyn ApprovalStrategy>,
    /// Serializes writes per (tool, session key).
    write_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("write_keys", &self.write_locks.len())
            .finish()
    }
}

fn normalize(session_id: Option<&str>) -> Option<&str> {
    session_id.filter(|s| !s.is_empty())
}

fn into_persistence(err: HostError) -> HostError {
    match err {
        persistence @ HostError::Persistence(_) => persistence,
        other => HostError::persistence(other.to_string()),
    }
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn DecisionStore>, strategy: Arc<dyn ApprovalStrategy>) -> Self {
        Self {
            store,
            strategy,
            write_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> Arc<dyn DecisionStore> {
        Arc::clone(&self.store)
    }

    fn write_key(tool_name: &str, session_id: Option<&str>) -> (String, String) {
        (tool_name.to_string(), session_key(session_id))
    }

    fn write_lock(&self, key: &(String, String)) -> Arc<Mutex<()>> {
        Arc::clone(
            self.write_locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drop the lock entry for `key` once no writer holds or waits on it.
    fn release_write_lock(&self, key: &(String, String), lock: Arc<Mutex<()>>) {
        drop(lock);
        self.write_locks
            .remove_if(key, |_, entry| Arc::strong_count(entry) == 1);
    }

    async fn lookup(&self, tool_name: &str, session_id: Option<&str>) -> bool {
        match self.store.is_tool_auto_approved(tool_name, session_id).await {
            Ok(approved) => approved,
            Err(e) => {
                tracing::warn!(
                    tool = %tool_name,
                    session = ?session_id,
                    error = %e,
                    "decision store lookup failed, treating as not approved"
                );
                false
            }
        }
    }

    /// Returns false if the write failed. Failures are logged once, never retried.
    async fn persist(&self, tool_name: &str, session_id: Option<&str>) -> bool {
        let key = Self::write_key(tool_name, session_id);
        let lock = self.write_lock(&key);
        let outcome = {
            let _guard = lock.lock().await;
            self.store.add_auto_approved_tool(tool_name, session_id).await
        };
        self.release_write_lock(&key, lock);

        match outcome {
            Ok(id) => {
                tracing::debug!(tool = %tool_name, session = ?session_id, id = %id, "persisted approval");
                true
            }
            Err(e) => {
                tracing::warn!(
                    tool = %tool_name,
                    session = ?session_id,
                    error = %e,
                    "failed to persist approval, honoring it for this call only"
                );
                false
            }
        }
    }

    /// Run one invocation through the state machine and return its terminal state.
    pub async fn evaluate(
        &self,
        tool_name: &str,
        params: &Value,
        session_id: Option<&str>,
        context: Option<Value>,
    ) -> ApprovalState {
        let session_id = normalize(session_id);
        let state = self
            .run(tool_name, params, session_id, context, None, &mut Vec::new())
            .await;
        tracing::info!(tool = %tool_name, session = ?session_id, state = ?state, "approval decision");
        state
    }

    /// `evaluate`, resolving as `Denied` if `cancel` fires before the strategy
    /// answers. A cancelled invocation never persists a decision.
    pub async fn evaluate_with_cancel(
        &self,
        tool_name: &str,
        params: &Value,
        session_id: Option<&str>,
        context: Option<Value>,
        cancel: &CancellationToken,
    ) -> ApprovalState {
        let session_id = normalize(session_id);
        let state = self
            .run(tool_name, params, session_id, context, Some(cancel), &mut Vec::new())
            .await;
        tracing::info!(tool = %tool_name, session = ?session_id, state = ?state, "approval decision");
        state
    }

    /// Drive the state machine, appending every state entered to `trail`.
    async fn run(
        &self,
        tool_name: &str,
        params: &Value,
        session_id: Option<&str>,
        context: Option<Value>,
        cancel: Option<&CancellationToken>,
        trail: &mut Vec<ApprovalState>,
    ) -> ApprovalState {
        let mut enter = |state: ApprovalState| {
            tracing::debug!(tool = %tool_name, session = ?session_id, state = ?state, "approval transition");
            trail.push(state);
            state
        };

        enter(ApprovalState::Requested);
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return enter(ApprovalState::Denied);
        }

        enter(ApprovalState::CheckGlobal);
        if self.lookup(tool_name, None).await {
            return enter(ApprovalState::ApprovedAuto);
        }

        if let Some(session) = session_id {
            enter(ApprovalState::CheckSession);
            if self.lookup(tool_name, Some(session)).await {
                return enter(ApprovalState::ApprovedAuto);
            }
        }

        enter(ApprovalState::Prompt);
        let request = ApprovalRequest::new(tool_name, params.clone())
            .with_session(session_id)
            .with_context(context);

        let response = match cancel {
            Some(token) => {
                let answered = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    response = self.strategy.request_approval(request) => Some(response),
                };
                match answered {
                    Some(response) if !token.is_cancelled() => response,
                    _ => {
                        tracing::info!(tool = %tool_name, session = ?session_id, "approval cancelled, denying");
                        return enter(ApprovalState::Denied);
                    }
                }
            }
            None => self.strategy.request_approval(request).await,
        };

        if !response.approved {
            return enter(ApprovalState::Denied);
        }

        let terminal = match response.scope {
            None | Some(ApprovalScope::Once) => ApprovalState::ApprovedOnce,
            Some(ApprovalScope::Session) => match session_id {
                Some(session) => {
                    if self.persist(tool_name, Some(session)).await {
                        ApprovalState::ApprovedSession
                    } else {
                        ApprovalState::ApprovedOnce
                    }
                }
                None => {
                    tracing::debug!(
                        tool = %tool_name,
                        "session scope without a session id, approving once"
                    );
                    ApprovalState::ApprovedOnce
                }
            },
            Some(ApprovalScope::Global) => {
                if self.persist(tool_name, None).await {
                    ApprovalState::ApprovedGlobal
                } else {
                    ApprovalState::ApprovedOnce
                }
            }
        };
        enter(terminal)
    }

    /// Whether the invocation may proceed.
    pub async fn should_approve(
        &self,
        tool_name: &str,
        params: &Value,
        session_id: Option<&str>,
        context: Option<Value>,
    ) -> bool {
        self.evaluate(tool_name, params, session_id, context)
            .await
            .is_approved()
    }

    /// Wrap `tool` so its `execute` only runs after approval.
    ///
    /// Name, description and schema are forwarded unchanged.
    pub fn wrap_tool(self: &Arc<Self>, tool: Arc<dyn UnifiedTool>) -> Arc<dyn UnifiedTool> {
        Arc::new(GatedTool {
            inner: tool,
            gate: Arc::clone(self),
        })
    }

    /// Persisted decisions for introspection.
    ///
    /// - `scope = Global`: global entries
    /// - `scope = Session`: entries of `session_id` (empty without one)
    /// - `scope = Once`: always empty
    /// - no scope: global entries, plus those of `session_id` if given
    pub async fn get_auto_approved_tools(
        &self,
        session_id: Option<&str>,
        scope: Option<ApprovalScope>,
    ) -> HostResult<Vec<AutoApprovedTool>> {
        let session_id = normalize(session_id);

        match scope {
            Some(ApprovalScope::Once) => Ok(Vec::new()),
            Some(ApprovalScope::Global) => self.store.get_auto_approved_tools(None).await.map_err(into_persistence),
            Some(ApprovalScope::Session) => match session_id {
                Some(session) => self
                    .store
                    .get_auto_approved_tools(Some(session))
                    .await
                    .map_err(into_persistence),
                None => Ok(Vec::new()),
            },
            None => {
                let mut entries = self.store.get_auto_approved_tools(None).await.map_err(into_persistence)?;
                if let Some(session) = session_id {
                    entries.extend(
                        self.store
                            .get_auto_approved_tools(Some(session))
                            .await
                            .map_err(into_persistence)?,
                    );
                }
                Ok(entries)
            }
        }
    }

    /// Revoke a persisted decision.
    ///
    /// Global and session entries are independent; only an unspecified scope
    /// touches both. Removing an absent entry is a no-op.
    pub async fn remove_auto_approved_tool(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
        scope: Option<ApprovalScope>,
    ) -> HostResult<()> {
        let session_id = normalize(session_id);
        match scope {
            Some(ApprovalScope::Once) => Ok(()),
            Some(ApprovalScope::Global) => self.revoke(tool_name, None).await,
            Some(ApprovalScope::Session) => match session_id {
                Some(session) => self.revoke(tool_name, Some(session)).await,
                None => Err(HostError::validation(
                    "Removing a session-scoped approval requires a session id",
                )),
            },
            None => {
                self.revoke(tool_name, None).await?;
                if let Some(session) = session_id {
                    self.revoke(tool_name, Some(session)).await?;
                }
                Ok(())
            }
        }
    }

    async fn revoke(&self, tool_name: &str, session_id: Option<&str>) -> HostResult<()> {
        let key = Self::write_key(tool_name, session_id);
        let lock = self.write_lock(&key);
        let outcome = {
            let _guard = lock.lock().await;
            self.store.remove_auto_approved_tool(tool_name, session_id).await
        };
        self.release_write_lock(&key, lock);
        outcome.map_err(into_persistence)?;
        tracing::info!(tool = %tool_name, session = ?session_id, "revoked approval");
        Ok(())
    }
}

// ============================================================================
// GatedTool
// ============================================================================

/// Tool proxy whose `execute` is unreachable without approval.
pub struct GatedTool {
    inner: Arc<dyn UnifiedTool>,
    gate: Arc<ApprovalGate>,
}

impl GatedTool {
    pub fn inner(&self) -> &Arc<dyn UnifiedTool> {
        &self.inner
    }
}

impl ToolDefinitionTrait for GatedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }
}

#[async_trait]
impl ToolExecutable for GatedTool {
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        let name = self.inner.name();
        let approved = self
            .gate
            .should_approve(name, &args, ctx.session_id(), Some(ctx.to_json()))
            .await;
        if !approved {
            return Err(CoreError::execution_denied(name));
        }
        self.inner.execute(ctx, args).await
    }
}
