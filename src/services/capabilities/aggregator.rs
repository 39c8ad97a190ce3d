//! Capability Aggregator
//!
//! Merges tool and middleware contributions from active extensions into one
//! namespace. Extensions are visited in activation order. For tools, the
//! first registration of a name wins; later ones are dropped and recorded as
//! collisions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use extension_host_core::{UnifiedTool, UnifiedToolRegistry};
use serde::Serialize;

use crate::services::capabilities::middleware::UnifiedMiddleware;
use crate::services::extensions::ActiveExtension;

/// A tool dropped because another extension already exposed the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCollision {
    pub tool_name: String,
    /// Extension whose tool was kept.
    pub kept: String,
    /// Extension whose tool was dropped.
    pub rejected: String,
}

/// Flat tool namespace built from active extensions.
#[derive(Debug, Default)]
pub struct AggregatedTools {
    registry: UnifiedToolRegistry,
    owners: HashMap<String, String>,
    collisions: Vec<ToolCollision>,
}

impl AggregatedTools {
    /// Tools in merge order.
    pub fn tools(&self) -> Vec<Arc<dyn UnifiedTool>> {
        self.registry.tools()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn UnifiedTool>> {
        self.registry.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Name, description and parameter schema of every tool, in merge order.
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        self.registry.definitions()
    }

    /// Extension that contributed `tool_name`.
    pub fn owner_of(&self, tool_name: &str) -> Option<&str> {
        self.owners.get(tool_name).map(String::as_str)
    }

    pub fn collisions(&self) -> &[ToolCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

/// Stateless merger of per-extension capabilities.
pub struct CapabilityAggregator;

impl CapabilityAggregator {
    /// Merge tools from `extensions` (expected in activation order).
    pub fn collect_tools(extensions: &[ActiveExtension]) -> AggregatedTools {
        let mut merged = AggregatedTools::default();

        for active in extensions {
            for tool in active.extension.tools(&active.context) {
                let name = tool.name().to_string();
                match merged.registry.try_register(tool) {
                    Ok(()) => {
                        merged.owners.insert(name, active.id.clone());
                    }
                    Err(conflict) => {
                        let kept = merged
                            .owners
                            .get(&conflict.name)
                            .cloned()
                            .unwrap_or_default();
                        tracing::warn!(
                            tool = %conflict.name,
                            kept = %kept,
                            rejected = %active.id,
                            "tool name collision, keeping first registration"
                        );
                        merged.collisions.push(ToolCollision {
                            tool_name: conflict.name,
                            kept,
                            rejected: active.id.clone(),
                        });
                    }
                }
            }
        }

        tracing::debug!(
            tools = merged.len(),
            collisions = merged.collisions.len(),
            "aggregated extension tools"
        );
        merged
    }

    /// Merge middleware from `extensions` (expected in activation order).
    pub fn collect_middleware(
        extensions: &[ActiveExtension],
        handler_timeout: Option<Duration>,
    ) -> UnifiedMiddleware {
        let mut unified = UnifiedMiddleware::new().with_handler_timeout(handler_timeout);
        for active in extensions {
            if let Some(middleware) = active.extension.middleware() {
                unified.push(active.id.clone(), middleware);
            }
        }
        unified
    }
}
