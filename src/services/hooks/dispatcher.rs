//! Hook Dispatcher
//!
//! Maintains `(hook_name, extension_id, handler)` registrations and raises
//! events to every handler registered for a hook.
//!
//! ## Dispatch contract
//!
//! - Zero handlers: `execute` resolves immediately with `Ok(())`.
//! - Handlers run concurrently inside one `execute` call; no ordering among
//!   them is guaranteed.
//! - Every handler runs to completion (success, error, panic or timeout)
//!   before the caller hears anything. Each failure is logged with the owning
//!   extension id, then a single `HostError::HookExecution` listing all of
//!   them is returned.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::utils::error::{HookFailure, HostError, HostResult};

// ============================================================================
// Types
// ============================================================================

/// Context handed to every hook handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HookContext {
    /// Hook being raised. Filled in by the dispatcher.
    pub hook_name: String,
    /// Extension owning the handler that receives this context. Filled in by the dispatcher.
    pub extension_id: Option<String>,
    /// Session the event belongs to, if any.
    pub session_id: Option<String>,
    /// Event-specific data.
    pub payload: Value,
}

impl HookContext {
    /// Context carrying only a payload.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    /// Attach a session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Future returned by a hook handler.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Hook handler contributed by an extension.
pub type HookHandler = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

/// Build a `HookHandler` from an async closure.
pub fn hook_handler<F, Fut>(f: F) -> HookHandler
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

#[derive(Clone)]
struct HookRegistration {
    extension_id: String,
    handler: HookHandler,
}

/// Introspection entry returned by `HookDispatcher::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSummary {
    pub hook_name: String,
    pub extension_ids: Vec<String>,
}

// ============================================================================
// Settling
// ============================================================================

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

/// Drive every `(owner, future)` pair to completion and aggregate failures.
///
/// Shared by the dispatcher and the unified middleware so both honor the same
/// all-run/aggregate-error contract.
pub(crate) async fn settle_all<'a>(
    hook_name: &str,
    pending: Vec<(String, BoxFuture<'a, Result<(), String>>)>,
    timeout: Option<Duration>,
) -> HostResult<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let runs = pending.into_iter().map(|(extension_id, fut)| async move {
        let guarded = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => Ok(Err(format!(
                    "handler timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(())) => None,
            Ok(Err(message)) => Some(HookFailure {
                extension_id,
                message,
            }),
            Err(payload) => Some(HookFailure {
                extension_id,
                message: panic_message(payload),
            }),
        }
    });

    let failures: Vec<HookFailure> = join_all(runs).await.into_iter().flatten().collect();

    if failures.is_empty() {
        return Ok(());
    }

    for failure in &failures {
        tracing::warn!(
            hook = %hook_name,
            extension = %failure.extension_id,
            error = %failure.message,
            "hook handler failed"
        );
    }

    Err(HostError::HookExecution {
        hook: hook_name.to_string(),
        failures,
    })
}

// ============================================================================
// HookDispatcher
// ============================================================================

/// Registry and dispatcher of named hooks.
///
/// Thread-safe. The registration lock is never held across an await.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: RwLock<BTreeMap<String, Vec<HookRegistration>>>,
    handler_timeout: Option<Duration>,
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("hooks", &self.list())
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}

impl HookDispatcher {
    /// Create a dispatcher with no registrations and no handler timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any single handler that runs longer than `timeout`.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Register a handler for `hook_name` owned by `extension_id`.
    ///
    /// One handler per `(hook_name, extension_id)`: re-registering replaces the
    /// prior handler in place.
    pub fn register(&self, hook_name: &str, extension_id: &str, handler: HookHandler) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let entries = hooks.entry(hook_name.to_string()).or_default();
        match entries.iter_mut().find(|r| r.extension_id == extension_id) {
            Some(existing) => existing.handler = handler,
            None => entries.push(HookRegistration {
                extension_id: extension_id.to_string(),
                handler,
            }),
        }
    }

    /// Remove the handler `extension_id` registered for `hook_name`.
    ///
    /// Returns true if a handler was removed.
    pub fn unregister(&self, hook_name: &str, extension_id: &str) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = hooks.get_mut(hook_name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|r| r.extension_id != extension_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            hooks.remove(hook_name);
        }
        removed
    }

    /// Remove every handler owned by `extension_id`. Returns how many were removed.
    pub fn unregister_all(&self, extension_id: &str) -> usize {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for entries in hooks.values_mut() {
            let before = entries.len();
            entries.retain(|r| r.extension_id != extension_id);
            removed += before - entries.len();
        }
        hooks.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Raise `hook_name` to every registered handler.
    ///
    /// Each handler receives `ctx` with `hook_name` and its own `extension_id` filled in.
    pub async fn execute(&self, hook_name: &str, ctx: HookContext) -> HostResult<()> {
        let registrations: Vec<HookRegistration> = {
            let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
            match hooks.get(hook_name) {
                Some(entries) => entries.clone(),
                None => return Ok(()),
            }
        };

        tracing::debug!(
            hook = %hook_name,
            handlers = registrations.len(),
            "dispatching hook"
        );

        let pending = registrations
            .into_iter()
            .map(|registration| {
                let mut handler_ctx = ctx.clone();
                handler_ctx.hook_name = hook_name.to_string();
                handler_ctx.extension_id = Some(registration.extension_id.clone());
                let handler = registration.handler;
                // Invoked on first poll, inside `settle_all`'s panic guard
                let fut: BoxFuture<'static, Result<(), String>> =
                    Box::pin(async move { handler(handler_ctx).await });
                (registration.extension_id, fut)
            })
            .collect();

        settle_all(hook_name, pending, self.handler_timeout).await
    }

    /// All hooks with at least one handler, sorted by hook name.
    pub fn list(&self) -> Vec<HookSummary> {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks
            .iter()
            .map(|(name, entries)| HookSummary {
                hook_name: name.clone(),
                extension_ids: entries.iter().map(|r| r.extension_id.clone()).collect(),
            })
            .collect()
    }

    /// Number of handlers registered for `hook_name`.
    pub fn handler_count(&self, hook_name: &str) -> usize {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.get(hook_name).map(Vec::len).unwrap_or(0)
    }

    /// Whether any handler is registered for `hook_name`.
    pub fn has_hook(&self, hook_name: &str) -> bool {
        self.handler_count(hook_name) > 0
    }

    /// Total number of registrations across all hooks.
    pub fn total_handlers(&self) -> usize {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.values().map(Vec::len).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
