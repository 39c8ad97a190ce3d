//! Extension Host
//!
//! Facade bundling configuration, the extension manager, the approval gate
//! and capability aggregation. This is what an agent runtime embeds.

use std::sync::Arc;

use extension_host_core::{CoreError, ExecutionContext, ToolContext, UnifiedTool};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::models::settings::{DecisionStoreKind, HostConfig};
use crate::services::approval::{ApprovalGate, ApprovalStrategy, DecisionStore, InMemoryDecisionStore};
use crate::services::capabilities::{AggregatedTools, CapabilityAggregator, UnifiedMiddleware};
use crate::services::extensions::{Extension, ExtensionFactoryRegistry, ExtensionManager};
use crate::services::hooks::{HookContext, HookDispatcher, LifecycleHook};
use crate::storage::SqliteDecisionStore;
use crate::utils::error::{HostError, HostResult};

/// Host runtime state
pub struct ExtensionHost {
    config: HostConfig,
    manager: Arc<ExtensionManager>,
    gate: Arc<ApprovalGate>,
    /// Whether `start` has completed
    started: RwLock<bool>,
}

impl std::fmt::Debug for ExtensionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHost")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .finish()
    }
}

impl ExtensionHost {
    /// Create a host with an explicit decision store and strategy. No
    /// extensions are registered.
    pub fn new(
        config: HostConfig,
        store: Arc<dyn DecisionStore>,
        strategy: Arc<dyn ApprovalStrategy>,
    ) -> HostResult<Self> {
        config.validate().map_err(HostError::config)?;

        let mut dispatcher = HookDispatcher::new();
        if let Some(timeout) = config.hook_timeout() {
            dispatcher = dispatcher.with_handler_timeout(timeout);
        }
        let manager = ExtensionManager::with_dispatcher(
            config.parsed_host_version(),
            Arc::new(dispatcher),
        );

        Ok(Self {
            config,
            manager: Arc::new(manager),
            gate: Arc::new(ApprovalGate::new(store, strategy)),
            started: RwLock::new(false),
        })
    }

    /// Build a host from configuration: open the configured decision store and
    /// register every enabled extension from `factories`, in config order.
    pub fn from_config(
        config: HostConfig,
        factories: &ExtensionFactoryRegistry,
        strategy: Arc<dyn ApprovalStrategy>,
    ) -> HostResult<Self> {
        config.validate().map_err(HostError::config)?;
        let store = Self::open_decision_store(&config)?;
        let host = Self::new(config, store, strategy)?;

        for id in &host.config.enabled_extensions {
            host.register(factories.create(id)?)?;
        }
        Ok(host)
    }

    /// Decision store selected by `config`.
    pub fn open_decision_store(config: &HostConfig) -> HostResult<Arc<dyn DecisionStore>> {
        Ok(match config.decision_store {
            DecisionStoreKind::Memory => Arc::new(InMemoryDecisionStore::new()),
            DecisionStoreKind::Sqlite => match &config.database_path {
                Some(path) => Arc::new(SqliteDecisionStore::open(path)?),
                None => Arc::new(SqliteDecisionStore::new()?),
            },
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn manager(&self) -> Arc<ExtensionManager> {
        Arc::clone(&self.manager)
    }

    pub fn gate(&self) -> Arc<ApprovalGate> {
        Arc::clone(&self.gate)
    }

    pub fn register(&self, extension: Arc<dyn Extension>) -> HostResult<()> {
        self.manager.register(extension)
    }

    pub async fn is_started(&self) -> bool {
        *self.started.read().await
    }

    /// Raise `framework:init` and activate every registered extension.
    ///
    /// Init hook failures are logged; activation errors are returned.
    /// Calling `start` on a started host is a no-op.
    pub async fn start(&self) -> HostResult<()> {
        let mut started = self.started.write().await;
        if *started {
            return Ok(());
        }

        if let Err(e) = self.manager.initialize().await {
            tracing::warn!(error = %e, "framework init hook failed");
        }
        self.manager.activate_all().await?;

        *started = true;
        tracing::info!(
            active = self.manager.activation_order().len(),
            "extension host started"
        );
        Ok(())
    }

    /// Deactivate everything and raise `framework:shutdown`.
    pub async fn stop(&self) -> HostResult<()> {
        let mut started = self.started.write().await;
        *started = false;
        self.manager.shutdown().await
    }

    /// Tools from active extensions, unwrapped.
    pub fn aggregated_tools(&self) -> AggregatedTools {
        CapabilityAggregator::collect_tools(&self.manager.active_extensions())
    }

    /// Tools from active extensions, each behind the approval gate.
    pub fn tools(&self) -> Vec<Arc<dyn UnifiedTool>> {
        self.aggregated_tools()
            .tools()
            .into_iter()
            .map(|tool| self.gate.wrap_tool(tool))
            .collect()
    }

    /// Middleware from active extensions.
    pub fn middleware(&self) -> UnifiedMiddleware {
        CapabilityAggregator::collect_middleware(
            &self.manager.active_extensions(),
            self.config.hook_timeout(),
        )
    }

    /// Invoke a tool by name through the approval gate.
    ///
    /// `tool:before_call` and `tool:after_call` are raised to hooks and
    /// middleware around the call; their failures are logged, not returned.
    pub async fn call_tool(&self, name: &str, args: Value, ctx: &ToolContext) -> HostResult<Value> {
        let tool = self
            .aggregated_tools()
            .get(name)
            .ok_or_else(|| HostError::not_found(format!("Tool not found: {}", name)))?;
        let gated = self.gate.wrap_tool(tool);
        let middleware = self.middleware();

        let mut before = HookContext::new(json!({ "tool": name, "args": args.clone() }));
        before.session_id = ctx.session_id().map(str::to_string);
        self.raise(LifecycleHook::BeforeToolCall, &middleware, before.clone())
            .await;

        let result = gated.execute(ctx, args).await;

        let mut after = before;
        after.payload = json!({ "tool": name, "success": result.is_ok() });
        self.raise(LifecycleHook::AfterToolCall, &middleware, after).await;

        result.map_err(|e| match e {
            CoreError::ExecutionDenied { tool_name } => HostError::ExecutionDenied { tool_name },
            other => HostError::Tool(other),
        })
    }

    async fn raise(&self, hook: LifecycleHook, middleware: &UnifiedMiddleware, ctx: HookContext) {
        if let Err(e) = self.manager.execute_hook(hook.as_str(), ctx.clone()).await {
            tracing::warn!(hook = %hook, error = %e, "tool hook failed");
        }

        let outcome = match hook {
            LifecycleHook::BeforeToolCall => middleware.before_tool_call(ctx).await,
            LifecycleHook::AfterToolCall => middleware.after_tool_call(ctx).await,
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            tracing::warn!(hook = %hook, error = %e, "tool middleware failed");
        }
    }
}
