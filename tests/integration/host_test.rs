//! Host Integration Tests
//!
//! Config file on disk, SQLite decision store, factory-built extensions,
//! aggregated tools and middleware, and gated tool calls end to end.

use std::sync::Arc;

use serde_json::{json, Value};

use extension_host::services::approval::{ApprovalResponse, ApprovalScope, StaticStrategy};
use extension_host::services::extensions::{ExtensionFactoryRegistry, ExtensionMetadata};
use extension_host::services::hooks::{hook_handler, HookContext, LifecycleHook};
use extension_host::storage::ConfigService;
use extension_host::{
    DecisionStoreKind, ExtensionHost, HostConfigUpdate, HostError, ToolContext, ToolDefinitionTrait,
};

use crate::support::{counting_strategy, init_logging, prompts, FixtureExtension, Journal, RecordingMiddleware, RecordingTool};

fn factories(journal: &Arc<Journal>) -> ExtensionFactoryRegistry {
    let fs_journal = Arc::clone(journal);
    let audit_journal = Arc::clone(journal);
    let shadow_journal = Arc::clone(journal);

    ExtensionFactoryRegistry::new()
        .with("fs", move || {
            FixtureExtension::new(ExtensionMetadata::new("fs", "1.2.0"), &fs_journal)
                .with_tool(Arc::new(RecordingTool::new("delete_file")))
                .with_tool(Arc::new(RecordingTool::new("read_file")))
                .into_arc()
        })
        .with("audit", move || {
            let hook_journal = Arc::clone(&audit_journal);
            FixtureExtension::new(
                ExtensionMetadata::new("audit", "0.4.0").depends_on("fs", "^1.2"),
                &audit_journal,
            )
            .with_middleware(Arc::new(RecordingMiddleware {
                journal: Arc::clone(&audit_journal),
            }))
            .with_hook(
                LifecycleHook::BeforeToolCall.as_str(),
                hook_handler(move |ctx: HookContext| {
                    let journal = Arc::clone(&hook_journal);
                    async move {
                        journal.push(format!(
                            "hook:before:{}:{}",
                            ctx.payload["tool"].as_str().unwrap_or(""),
                            ctx.session_id.unwrap_or_default()
                        ));
                        Ok(())
                    }
                }),
            )
            .into_arc()
        })
        .with("shadow", move || {
            FixtureExtension::new(ExtensionMetadata::new("shadow", "1.0.0"), &shadow_journal)
                .with_tool(Arc::new(RecordingTool::new("delete_file")))
                .into_arc()
        })
}

fn open_config(dir: &std::path::Path, extensions: &[&str]) -> ConfigService {
    let mut service = ConfigService::open(dir.join("host.json")).unwrap();
    service
        .update_config(HostConfigUpdate {
            enabled_extensions: Some(extensions.iter().map(|s| s.to_string()).collect()),
            decision_store: Some(DecisionStoreKind::Sqlite),
            database_path: Some(dir.join("decisions.db")),
            hook_timeout_ms: Some(2_000),
            ..HostConfigUpdate::default()
        })
        .unwrap();
    service.save().unwrap();
    service
}

#[tokio::test]
async fn test_host_boots_from_config_file() {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    open_config(temp_dir.path(), &["audit", "fs"]);

    // A fresh service reads what was saved
    let config = ConfigService::open(temp_dir.path().join("host.json"))
        .unwrap()
        .get_config_clone();
    assert_eq!(config.enabled_extensions, vec!["audit", "fs"]);

    let host = ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::approve_all(None)),
    )
    .unwrap();
    host.start().await.unwrap();

    // audit registers first but depends on fs
    assert_eq!(host.manager().activation_order(), vec!["fs", "audit"]);
    assert!(temp_dir.path().join("decisions.db").exists());

    let mut names = host.aggregated_tools().names();
    names.sort();
    assert_eq!(names, vec!["delete_file", "read_file"]);
    assert_eq!(host.middleware().extension_ids(), vec!["audit"]);
}

#[tokio::test]
async fn test_first_registered_tool_wins() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let config = open_config(temp_dir.path(), &["fs", "shadow"]).get_config_clone();

    let host = ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::deny_all()),
    )
    .unwrap();
    host.start().await.unwrap();

    let tools = host.aggregated_tools();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools.owner_of("delete_file"), Some("fs"));
    assert_eq!(tools.collisions().len(), 1);
    assert_eq!(tools.collisions()[0].kept, "fs");
    assert_eq!(tools.collisions()[0].rejected, "shadow");

    let definitions = tools.definitions();
    assert_eq!(definitions.len(), 2);
    assert_eq!(definitions[0]["name"], "delete_file");
    assert_eq!(definitions[0]["description"], "Records its arguments");
    assert_eq!(definitions[0]["parameters"]["properties"]["path"]["type"], "string");
}

#[tokio::test]
async fn test_call_tool_raises_hooks_and_middleware() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let config = open_config(temp_dir.path(), &["fs", "audit"]).get_config_clone();

    let (strategy, calls) = counting_strategy(ApprovalResponse::approve(Some(ApprovalScope::Session)));
    let host = ExtensionHost::from_config(config, &factories(&journal), strategy).unwrap();
    host.start().await.unwrap();

    let ctx = ToolContext::new("s1", "coder", "call-1");
    let out = host
        .call_tool("delete_file", json!({"path": "/tmp/a"}), &ctx)
        .await
        .unwrap();
    assert_eq!(out["ok"], Value::Bool(true));

    let entries: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| !e.starts_with("activate:"))
        .collect();
    assert_eq!(
        entries,
        vec!["hook:before:delete_file:s1", "mw:before:delete_file", "mw:after:true"]
    );

    host.call_tool("delete_file", json!({"path": "/tmp/b"}), &ctx)
        .await
        .unwrap();
    assert_eq!(prompts(&calls), 1);

    let other = ToolContext::new("s2", "coder", "call-2");
    host.call_tool("delete_file", json!({"path": "/tmp/a"}), &other)
        .await
        .unwrap();
    assert_eq!(prompts(&calls), 2);
}

#[tokio::test]
async fn test_denied_call_reports_failure_to_middleware() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let config = open_config(temp_dir.path(), &["fs", "audit"]).get_config_clone();

    let host = ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::deny_all()),
    )
    .unwrap();
    host.start().await.unwrap();

    let ctx = ToolContext::new("s1", "coder", "call-1");
    let err = host
        .call_tool("delete_file", json!({"path": "/"}), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::ExecutionDenied { ref tool_name } if tool_name == "delete_file"));
    assert!(journal.entries().contains(&"mw:after:false".to_string()));
}

#[tokio::test]
async fn test_gated_tools_forward_definitions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let config = open_config(temp_dir.path(), &["fs"]).get_config_clone();

    let host = ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::deny_all()),
    )
    .unwrap();
    host.start().await.unwrap();

    let mut tools = host.tools();
    tools.sort_by(|a, b| a.name().cmp(b.name()));
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name(), "delete_file");
    assert_eq!(tools[0].description(), "Records its arguments");
    assert_eq!(tools[0].parameters_schema()["type"], "object");
}

#[tokio::test]
async fn test_stop_deactivates_in_reverse_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let config = open_config(temp_dir.path(), &["fs", "audit"]).get_config_clone();

    let host = ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::deny_all()),
    )
    .unwrap();
    host.start().await.unwrap();
    host.stop().await.unwrap();

    let teardown: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("deactivate:"))
        .collect();
    assert_eq!(teardown, vec!["deactivate:audit", "deactivate:fs"]);
    assert!(host.aggregated_tools().is_empty());
    assert!(host.middleware().is_empty());
}

#[test]
fn test_memory_store_needs_no_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let journal = Journal::new();
    let mut config = open_config(temp_dir.path(), &["fs"]).get_config_clone();
    config.decision_store = DecisionStoreKind::Memory;
    config.database_path = Some(temp_dir.path().join("unused.db"));

    ExtensionHost::from_config(
        config,
        &factories(&journal),
        Arc::new(StaticStrategy::deny_all()),
    )
    .unwrap();
    assert!(!temp_dir.path().join("unused.db").exists());
}
