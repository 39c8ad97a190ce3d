//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use extension_host::services::approval::{ApprovalResponse, ApprovalStrategy, FnStrategy};
use extension_host::services::capabilities::ExtensionMiddleware;
use extension_host::services::extensions::{Extension, ExtensionContext, ExtensionMetadata};
use extension_host::services::hooks::{HookContext, HookHandler};
use extension_host::{CoreResult, ToolContext, ToolDefinitionTrait, ToolExecutable, UnifiedTool};

/// Install the log subscriber; `RUST_LOG=debug` shows host events while debugging tests.
pub fn init_logging() {
    extension_host::utils::init_tracing();
}

/// Ordered record of side effects shared between fixtures.
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Tool that records the context and arguments of every call it receives.
pub struct RecordingTool {
    pub name: String,
    pub calls: Arc<Mutex<Vec<(ToolContext, Value)>>>,
}

impl RecordingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ToolDefinitionTrait for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its arguments"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } }
        })
    }
}

#[async_trait]
impl ToolExecutable for RecordingTool {
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        self.calls.lock().unwrap().push((ctx.clone(), args.clone()));
        Ok(serde_json::json!({ "ok": true, "echo": args }))
    }
}

/// Configurable extension used across the integration suite.
pub struct FixtureExtension {
    pub metadata: ExtensionMetadata,
    pub journal: Arc<Journal>,
    pub tools: Vec<Arc<dyn UnifiedTool>>,
    pub hooks: Vec<(String, HookHandler)>,
    pub middleware: Option<Arc<dyn ExtensionMiddleware>>,
}

impl FixtureExtension {
    pub fn new(metadata: ExtensionMetadata, journal: &Arc<Journal>) -> Self {
        Self {
            metadata,
            journal: Arc::clone(journal),
            tools: Vec::new(),
            hooks: Vec::new(),
            middleware: None,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn UnifiedTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_hook(mut self, hook_name: &str, handler: HookHandler) -> Self {
        self.hooks.push((hook_name.to_string(), handler));
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn ExtensionMiddleware>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    pub fn into_arc(self) -> Arc<dyn Extension> {
        Arc::new(self)
    }
}

#[async_trait]
impl Extension for FixtureExtension {
    fn metadata(&self) -> ExtensionMetadata {
        self.metadata.clone()
    }

    fn hooks(&self) -> Vec<(String, HookHandler)> {
        self.hooks.clone()
    }

    async fn activate(&self, ctx: &ExtensionContext) -> Result<(), String> {
        // Dependencies must already be active when this runs
        for dependency in self.metadata.dependencies.extensions.keys() {
            if !ctx.is_extension_active(dependency) {
                return Err(format!("{} activated before {}", ctx.extension_id(), dependency));
            }
        }
        self.journal.push(format!("activate:{}", ctx.extension_id()));
        Ok(())
    }

    async fn deactivate(&self, ctx: &ExtensionContext) -> Result<(), String> {
        self.journal.push(format!("deactivate:{}", ctx.extension_id()));
        Ok(())
    }

    fn tools(&self, _ctx: &ExtensionContext) -> Vec<Arc<dyn UnifiedTool>> {
        self.tools.clone()
    }

    fn middleware(&self) -> Option<Arc<dyn ExtensionMiddleware>> {
        self.middleware.clone()
    }
}

/// Middleware that records which points fired.
pub struct RecordingMiddleware {
    pub journal: Arc<Journal>,
}

#[async_trait]
impl ExtensionMiddleware for RecordingMiddleware {
    async fn before_tool_call(&self, ctx: &HookContext) -> Result<(), String> {
        self.journal.push(format!("mw:before:{}", ctx.payload["tool"].as_str().unwrap_or("")));
        Ok(())
    }

    async fn after_tool_call(&self, ctx: &HookContext) -> Result<(), String> {
        self.journal.push(format!("mw:after:{}", ctx.payload["success"]));
        Ok(())
    }
}

/// Strategy returning `response` and counting how often it was consulted.
pub fn counting_strategy(response: ApprovalResponse) -> (Arc<dyn ApprovalStrategy>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let strategy = FnStrategy::new(move |_request| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { response }
    });
    (Arc::new(strategy), calls)
}

pub fn prompts(calls: &Arc<AtomicUsize>) -> usize {
    calls.load(Ordering::SeqCst)
}
