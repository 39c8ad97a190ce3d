//! Middleware
//!
//! `ExtensionMiddleware` is the named-capability interface an extension
//! implements to observe generation and tool calls. `UnifiedMiddleware` merges
//! every contribution into one callback per lifecycle point and fans out with
//! the same all-run/aggregate-error contract as hook dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::services::hooks::dispatcher::settle_all;
use crate::services::hooks::{HookContext, LifecycleHook};
use crate::utils::error::HostResult;

/// Middleware contributed by an extension. All points default to no-ops.
#[async_trait]
pub trait ExtensionMiddleware: Send + Sync {
    async fn before_generation(&self, _ctx: &HookContext) -> Result<(), String> {
        Ok(())
    }

    async fn after_generation(&self, _ctx: &HookContext) -> Result<(), String> {
        Ok(())
    }

    async fn before_tool_call(&self, _ctx: &HookContext) -> Result<(), String> {
        Ok(())
    }

    async fn after_tool_call(&self, _ctx: &HookContext) -> Result<(), String> {
        Ok(())
    }
}

/// Lifecycle points covered by middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewarePoint {
    BeforeGeneration,
    AfterGeneration,
    BeforeToolCall,
    AfterToolCall,
}

impl MiddlewarePoint {
    pub fn hook(&self) -> LifecycleHook {
        match self {
            Self::BeforeGeneration => LifecycleHook::BeforeGeneration,
            Self::AfterGeneration => LifecycleHook::AfterGeneration,
            Self::BeforeToolCall => LifecycleHook::BeforeToolCall,
            Self::AfterToolCall => LifecycleHook::AfterToolCall,
        }
    }
}

/// Every active extension's middleware behind one callback per point.
#[derive(Clone, Default)]
pub struct UnifiedMiddleware {
    entries: Vec<(String, Arc<dyn ExtensionMiddleware>)>,
    handler_timeout: Option<Duration>,
}

impl std::fmt::Debug for UnifiedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owners: Vec<&str> = self.entries.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("UnifiedMiddleware")
            .field("extensions", &owners)
            .finish()
    }
}

impl UnifiedMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Append a contribution owned by `extension_id`.
    pub fn push(&mut self, extension_id: impl Into<String>, middleware: Arc<dyn ExtensionMiddleware>) {
        self.entries.push((extension_id.into(), middleware));
    }

    pub fn extension_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn before_generation(&self, ctx: HookContext) -> HostResult<()> {
        self.run(MiddlewarePoint::BeforeGeneration, ctx).await
    }

    pub async fn after_generation(&self, ctx: HookContext) -> HostResult<()> {
        self.run(MiddlewarePoint::AfterGeneration, ctx).await
    }

    pub async fn before_tool_call(&self, ctx: HookContext) -> HostResult<()> {
        self.run(MiddlewarePoint::BeforeToolCall, ctx).await
    }

    pub async fn after_tool_call(&self, ctx: HookContext) -> HostResult<()> {
        self.run(MiddlewarePoint::AfterToolCall, ctx).await
    }

    /// Fan out to every contribution for `point`.
    pub async fn run(&self, point: MiddlewarePoint, ctx: HookContext) -> HostResult<()> {
        let hook_name = point.hook().as_str();

        let pending = self
            .entries
            .iter()
            .map(|(extension_id, middleware)| {
                let middleware = Arc::clone(middleware);
                let mut ctx = ctx.clone();
                ctx.hook_name = hook_name.to_string();
                ctx.extension_id = Some(extension_id.clone());

                let fut: BoxFuture<'static, Result<(), String>> = Box::pin(async move {
                    match point {
                        MiddlewarePoint::BeforeGeneration => middleware.before_generation(&ctx).await,
                        MiddlewarePoint::AfterGeneration => middleware.after_generation(&ctx).await,
                        MiddlewarePoint::BeforeToolCall => middleware.before_tool_call(&ctx).await,
                        MiddlewarePoint::AfterToolCall => middleware.after_tool_call(&ctx).await,
                    }
                });
                (extension_id.clone(), fut)
            })
            .collect();

        settle_all(hook_name, pending, self.handler_timeout).await
    }
}
