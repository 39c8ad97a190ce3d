//! Approval Gate Integration Tests
//!
//! Scope persistence, session isolation, store failures and interactive
//! resolution, against both decision store implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use extension_host::services::approval::{
    ApprovalGate, ApprovalResponse, ApprovalScope, ApprovalState, AutoApprovedTool,
    DecisionStore, InMemoryDecisionStore, InteractiveStrategy,
};
use extension_host::storage::SqliteDecisionStore;
use extension_host::{CoreError, HostError, HostResult, ToolContext, ToolDefinitionTrait, ToolExecutable};

use crate::support::{counting_strategy, init_logging, prompts, RecordingTool};

/// Store whose every operation fails.
struct UnavailableStore;

#[async_trait]
impl DecisionStore for UnavailableStore {
    async fn is_tool_auto_approved(&self, _tool_name: &str, _session_id: Option<&str>) -> HostResult<bool> {
        Err(HostError::database("disk I/O error"))
    }

    async fn add_auto_approved_tool(&self, _tool_name: &str, _session_id: Option<&str>) -> HostResult<String> {
        Err(HostError::database("disk I/O error"))
    }

    async fn get_auto_approved_tools(&self, _session_id: Option<&str>) -> HostResult<Vec<AutoApprovedTool>> {
        Err(HostError::database("disk I/O error"))
    }

    async fn remove_auto_approved_tool(&self, _tool_name: &str, _session_id: Option<&str>) -> HostResult<()> {
        Err(HostError::database("disk I/O error"))
    }
}

fn stores() -> Vec<(&'static str, Arc<dyn DecisionStore>)> {
    vec![
        ("memory", Arc::new(InMemoryDecisionStore::new()) as Arc<dyn DecisionStore>),
        ("sqlite", Arc::new(SqliteDecisionStore::new_in_memory().unwrap()) as Arc<dyn DecisionStore>),
    ]
}

// ============================================================================
// Scopes
// ============================================================================

#[tokio::test]
async fn test_once_scope_prompts_every_time() {
    for (label, store) in stores() {
        let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Once)));
        let gate = ApprovalGate::new(Arc::clone(&store), strategy);

        for _ in 0..2 {
            let state = gate.evaluate("read_file", &json!({}), Some("s1"), None).await;
            assert_eq!(state, ApprovalState::ApprovedOnce, "{label}");
        }
        assert_eq!(prompts(&calls), 2, "{label}");
        assert!(store.get_auto_approved_tools(None).await.unwrap().is_empty());
        assert!(store.get_auto_approved_tools(Some("s1")).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_session_scope_is_isolated_per_session() {
    for (label, store) in stores() {
        let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Session)));
        let gate = ApprovalGate::new(store, strategy);

        let first = gate.evaluate("delete_file", &json!({"path": "/tmp/a"}), Some("s1"), None).await;
        assert_eq!(first, ApprovalState::ApprovedSession, "{label}");
        assert_eq!(prompts(&calls), 1);

        let again = gate.evaluate("delete_file", &json!({"path": "/tmp/b"}), Some("s1"), None).await;
        assert_eq!(again, ApprovalState::ApprovedAuto, "{label}");
        assert_eq!(prompts(&calls), 1, "{label}: s1 must not prompt twice");

        let other = gate.evaluate("delete_file", &json!({"path": "/tmp/a"}), Some("s2"), None).await;
        assert_eq!(other, ApprovalState::ApprovedSession, "{label}");
        assert_eq!(prompts(&calls), 2, "{label}: s2 must prompt");
    }
}

#[tokio::test]
async fn test_global_scope_covers_all_sessions() {
    for (label, store) in stores() {
        let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Global)));
        let gate = ApprovalGate::new(store, strategy);

        assert_eq!(
            gate.evaluate("list_dir", &json!({}), Some("s1"), None).await,
            ApprovalState::ApprovedGlobal,
            "{label}"
        );
        for session in [Some("s2"), Some("s3"), None] {
            assert_eq!(
                gate.evaluate("list_dir", &json!({}), session, None).await,
                ApprovalState::ApprovedAuto,
                "{label}"
            );
        }
        assert_eq!(prompts(&calls), 1, "{label}");
    }
}

#[tokio::test]
async fn test_denial_is_not_remembered() {
    for (label, store) in stores() {
        let (strategy, calls) = counting_strategy(ApprovalResponse::deny());
        let gate = ApprovalGate::new(Arc::clone(&store), strategy);

        for _ in 0..2 {
            assert_eq!(
                gate.evaluate("rm_rf", &json!({}), Some("s1"), None).await,
                ApprovalState::Denied,
                "{label}"
            );
        }
        assert_eq!(prompts(&calls), 2);
        assert!(!store.is_tool_auto_approved("rm_rf", Some("s1")).await.unwrap());
    }
}

#[tokio::test]
async fn test_revoked_session_decision_prompts_again() {
    let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Session)));
    let gate = ApprovalGate::new(Arc::new(SqliteDecisionStore::new_in_memory().unwrap()), strategy);

    gate.evaluate("write_file", &json!({}), Some("s1"), None).await;
    let listed = gate
        .get_auto_approved_tools(Some("s1"), Some(ApprovalScope::Session))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].scope(), ApprovalScope::Session);

    gate.remove_auto_approved_tool("write_file", Some("s1"), Some(ApprovalScope::Session))
        .await
        .unwrap();
    assert_eq!(
        gate.evaluate("write_file", &json!({}), Some("s1"), None).await,
        ApprovalState::ApprovedSession
    );
    assert_eq!(prompts(&calls), 2);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_global_decision_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("decisions.db");

    {
        let (strategy, _) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Global)));
        let gate = ApprovalGate::new(Arc::new(SqliteDecisionStore::open(&path).unwrap()), strategy);
        assert_eq!(
            gate.evaluate("git_push", &json!({}), None, None).await,
            ApprovalState::ApprovedGlobal
        );
    }

    let (strategy, calls) = counting_strategy(ApprovalResponse::deny());
    let gate = ApprovalGate::new(Arc::new(SqliteDecisionStore::open(&path).unwrap()), strategy);
    assert_eq!(
        gate.evaluate("git_push", &json!({}), Some("fresh"), None).await,
        ApprovalState::ApprovedAuto
    );
    assert_eq!(prompts(&calls), 0);
}

#[tokio::test]
async fn test_store_failure_degrades_to_once() {
    init_logging();
    let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Global)));
    let gate = ApprovalGate::new(Arc::new(UnavailableStore), strategy);

    for _ in 0..2 {
        assert_eq!(
            gate.evaluate("deploy", &json!({}), Some("s1"), None).await,
            ApprovalState::ApprovedOnce
        );
    }
    assert_eq!(prompts(&calls), 2);

    let err = gate.get_auto_approved_tools(None, None).await.unwrap_err();
    assert!(matches!(err, HostError::Persistence(_)));
    let err = gate
        .remove_auto_approved_tool("deploy", None, Some(ApprovalScope::Global))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Persistence(_)));
}

// ============================================================================
// Wrapped tools
// ============================================================================

#[tokio::test]
async fn test_denied_tool_never_executes() {
    let (strategy, _) = counting_strategy(ApprovalResponse::deny());
    let gate = Arc::new(ApprovalGate::new(Arc::new(InMemoryDecisionStore::new()), strategy));
    let tool = RecordingTool::new("delete_file");
    let calls = Arc::clone(&tool.calls);

    let gated = gate.wrap_tool(Arc::new(tool));
    assert_eq!(gated.name(), "delete_file");
    assert_eq!(gated.description(), "Records its arguments");

    let ctx = ToolContext::new("s1", "agent", "call-1");
    let err = gated.execute(&ctx, json!({"path": "/etc"})).await.unwrap_err();
    assert!(matches!(err, CoreError::ExecutionDenied { ref tool_name } if tool_name == "delete_file"));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrapped_tool_uses_context_session() {
    let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Session)));
    let gate = Arc::new(ApprovalGate::new(Arc::new(InMemoryDecisionStore::new()), strategy));
    let tool = RecordingTool::new("delete_file");
    let executed = Arc::clone(&tool.calls);
    let gated = gate.wrap_tool(Arc::new(tool));

    let s1 = ToolContext::new("s1", "agent", "call-1")
        .with_execution_tag("plan-3")
        .with_metadata("turn", json!(7));
    let s2 = ToolContext::new("s2", "agent", "call-2");
    gated.execute(&s1, json!({"path": "a"})).await.unwrap();
    gated.execute(&s1, json!({"path": "b", "recursive": true})).await.unwrap();
    assert_eq!(prompts(&calls), 1);

    gated.execute(&s2, json!({"path": "c"})).await.unwrap();
    assert_eq!(prompts(&calls), 2);

    // Arguments and call context reach the inner tool unchanged
    let executed = executed.lock().unwrap().clone();
    assert_eq!(
        executed,
        vec![
            (s1.clone(), json!({"path": "a"})),
            (s1.clone(), json!({"path": "b", "recursive": true})),
            (s2.clone(), json!({"path": "c"})),
        ]
    );
    assert_eq!(executed[1].0.tool_call_id(), "call-1");
    assert_eq!(executed[1].0.metadata("turn"), Some(&json!(7)));
}

// ============================================================================
// Interactive strategy
// ============================================================================

#[tokio::test]
async fn test_interactive_resolution_persists_scope() {
    let (strategy, mut prompt_rx) = InteractiveStrategy::with_channel(4);
    let strategy = Arc::new(strategy);
    let gate = Arc::new(ApprovalGate::new(
        Arc::new(InMemoryDecisionStore::new()),
        Arc::clone(&strategy) as _,
    ));

    let waiting = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            gate.evaluate("deploy", &json!({"env": "prod"}), Some("s1"), Some(json!({"agent": "ops"})))
                .await
        })
    };

    let prompt = prompt_rx.recv().await.unwrap();
    assert_eq!(prompt.request.tool_name, "deploy");
    assert_eq!(prompt.request.params, json!({"env": "prod"}));
    assert_eq!(prompt.request.session_id.as_deref(), Some("s1"));
    assert_eq!(strategy.pending_ids(), vec![prompt.request.request_id.clone()]);

    assert!(strategy.resolve(
        &prompt.request.request_id,
        ApprovalResponse::approve(Some(ApprovalScope::Session))
    ));
    assert_eq!(waiting.await.unwrap(), ApprovalState::ApprovedSession);
    assert_eq!(strategy.pending_count(), 0);
    assert!(!strategy.resolve(&prompt.request.request_id, ApprovalResponse::deny()));

    // Remembered: no new prompt
    assert_eq!(
        gate.evaluate("deploy", &json!({}), Some("s1"), None).await,
        ApprovalState::ApprovedAuto
    );
    assert!(prompt_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_cancelled_session_denies_pending_request() {
    let (strategy, mut prompt_rx) = InteractiveStrategy::with_channel(4);
    let strategy = Arc::new(strategy);
    let gate = Arc::new(ApprovalGate::new(
        Arc::new(InMemoryDecisionStore::new()),
        Arc::clone(&strategy) as _,
    ));

    let waiting = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.evaluate("shell", &json!({}), Some("s1"), None).await })
    };
    prompt_rx.recv().await.unwrap();

    assert_eq!(strategy.cancel_session("s2"), 0);
    assert_eq!(strategy.cancel_session("s1"), 1);
    assert_eq!(waiting.await.unwrap(), ApprovalState::Denied);
}

#[tokio::test]
async fn test_cancellation_token_denies_and_clears_pending() {
    let (strategy, mut prompt_rx) = InteractiveStrategy::with_channel(4);
    let strategy = Arc::new(strategy);
    let gate = Arc::new(ApprovalGate::new(
        Arc::new(InMemoryDecisionStore::new()),
        Arc::clone(&strategy) as _,
    ));
    let cancel = CancellationToken::new();

    let waiting = {
        let gate = Arc::clone(&gate);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            gate.evaluate_with_cancel("shell", &json!({}), Some("s1"), None, &cancel)
                .await
        })
    };
    prompt_rx.recv().await.unwrap();
    assert_eq!(strategy.pending_count(), 1);

    cancel.cancel();
    assert_eq!(waiting.await.unwrap(), ApprovalState::Denied);
    assert_eq!(strategy.pending_count(), 0);
}

#[tokio::test]
async fn test_interactive_without_channel_denies() {
    let strategy = Arc::new(InteractiveStrategy::new());
    let gate = ApprovalGate::new(Arc::new(InMemoryDecisionStore::new()), Arc::clone(&strategy) as _);
    assert_eq!(
        gate.evaluate("shell", &json!({}), Some("s1"), None).await,
        ApprovalState::Denied
    );
    assert_eq!(strategy.pending_count(), 0);
}
