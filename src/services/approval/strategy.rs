//! Approval Strategies
//!
//! An `ApprovalStrategy` turns an approval request into a decision. Three
//! implementations ship with the host:
//!
//! - `StaticStrategy` - fixed answer, for headless policies and tests
//! - `FnStrategy` - wraps an async closure
//! - `InteractiveStrategy` - publishes a prompt and waits for `resolve()`
//!
//! Strategy failures never surface as errors: anything that prevents an
//! answer resolves as denied.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::services::approval::models::{ApprovalRequest, ApprovalResponse, ApprovalScope};

/// Source of approval decisions.
#[async_trait]
pub trait ApprovalStrategy: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalResponse;
}

// ============================================================================
// StaticStrategy
// ============================================================================

/// Always returns the same response.
#[derive(Debug, Clone, Copy)]
pub struct StaticStrategy {
    response: ApprovalResponse,
}

impl StaticStrategy {
    pub fn new(response: ApprovalResponse) -> Self {
        Self { response }
    }

    pub fn approve_all(scope: Option<ApprovalScope>) -> Self {
        Self::new(ApprovalResponse::approve(scope))
    }

    pub fn deny_all() -> Self {
        Self::new(ApprovalResponse::deny())
    }
}

#[async_trait]
impl ApprovalStrategy for StaticStrategy {
    async fn request_approval(&self, _request: ApprovalRequest) -> ApprovalResponse {
        self.response
    }
}

// ============================================================================
// FnStrategy
// ============================================================================

type ApprovalFn = Box<dyn Fn(ApprovalRequest) -> BoxFuture<'static, ApprovalResponse> + Send + Sync>;

/// Strategy backed by an async closure.
pub struct FnStrategy {
    f: ApprovalFn,
}

impl FnStrategy {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ApprovalRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApprovalResponse> + Send + 'static,
    {
        Self {
            f: Box::new(move |request| Box::pin(f(request))),
        }
    }
}

impl std::fmt::Debug for FnStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStrategy").finish_non_exhaustive()
    }
}

#[async_trait]
impl ApprovalStrategy for FnStrategy {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalResponse {
        (self.f)(request).await
    }
}

// ============================================================================
// InteractiveStrategy
// ============================================================================

/// Prompt published to the user interface for one pending request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPrompt {
    pub request: ApprovalRequest,
}

struct PendingApproval {
    session_id: Option<String>,
    sender: oneshot::Sender<ApprovalResponse>,
}

type PendingMap = Mutex<HashMap<String, PendingApproval>>;

/// Removes the pending entry if the waiting future goes away first.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    request_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&self.request_id);
    }
}

/// Human-in-the-loop strategy.
///
/// Each request is stored in a pending map keyed by its request id and
/// published as an `ApprovalPrompt`. The caller parks until `resolve()`
/// answers it. A missing or closed prompt channel, a dropped request, or a
/// cancelled session all resolve as denied.
pub struct InteractiveStrategy {
    pending: PendingMap,
    prompt_tx: RwLock<Option<mpsc::Sender<ApprovalPrompt>>>,
}

impl Default for InteractiveStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InteractiveStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveStrategy")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl InteractiveStrategy {
    /// Strategy with no prompt channel attached. Every request is denied until
    /// `set_prompt_sender` is called.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            prompt_tx: RwLock::new(None),
        }
    }

    /// Strategy wired to a fresh prompt channel.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<ApprovalPrompt>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let strategy = Self {
            pending: Mutex::new(HashMap::new()),
            prompt_tx: RwLock::new(Some(tx)),
        };
        (strategy, rx)
    }

    pub async fn set_prompt_sender(&self, tx: mpsc::Sender<ApprovalPrompt>) {
        *self.prompt_tx.write().await = Some(tx);
    }

    pub async fn clear_prompt_sender(&self) {
        *self.prompt_tx.write().await = None;
    }

    /// Answer a pending request. Returns false if no such request is waiting.
    pub fn resolve(&self, request_id: &str, response: ApprovalResponse) -> bool {
        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(request_id)
        };
        match entry {
            Some(entry) => entry.sender.send(response).is_ok(),
            None => false,
        }
    }

    /// Deny every pending request belonging to `session_id`. Returns how many were cancelled.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let before = pending.len();
        // Dropping the sender wakes the waiter with a RecvError
        pending.retain(|_, entry| entry.session_id.as_deref() != Some(session_id));
        before - pending.len()
    }

    /// Deny every pending request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Ids of requests still waiting for an answer.
    pub fn pending_ids(&self) -> Vec<String> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.keys().cloned().collect()
    }
}

#[async_trait]
impl ApprovalStrategy for InteractiveStrategy {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalResponse {
        let request_id = request.request_id.clone();
        let tool_name = request.tool_name.clone();
        let (tx, rx) = oneshot::channel::<ApprovalResponse>();

        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(
                request_id.clone(),
                PendingApproval {
                    session_id: request.session_id.clone(),
                    sender: tx,
                },
            );
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: request_id.clone(),
        };

        let prompt_tx = self.prompt_tx.read().await.clone();
        let Some(prompt_tx) = prompt_tx else {
            tracing::warn!(tool = %tool_name, "no prompt channel attached, denying");
            return ApprovalResponse::deny();
        };

        if prompt_tx.send(ApprovalPrompt { request }).await.is_err() {
            tracing::warn!(tool = %tool_name, "prompt channel closed, denying");
            return ApprovalResponse::deny();
        }

        match rx.await {
            Ok(response) => response,
            Err(_) => {
                tracing::info!(tool = %tool_name, request_id = %request_id, "approval request cancelled");
                ApprovalResponse::deny()
            }
        }
    }
}
