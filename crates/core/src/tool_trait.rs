//! Unified Tool Trait
//!
//! Split definition/execution traits for tools contributed by extensions:
//!
//! - `ToolDefinitionTrait` - Identity and parameter schema
//! - `ToolExecutable` - Execution capability
//! - `UnifiedTool` - Combined trait (auto-implemented via blanket impl)
//! - `UnifiedToolRegistry` - Name-keyed registry with ordered iteration
//!
//! The split lets the approval gate wrap `execute` while forwarding the
//! definition untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::CoreResult;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Tool definition metadata trait.
pub trait ToolDefinitionTrait: Send + Sync {
    /// Unique name of this tool (e.g., "read_file", "delete_file").
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema describing input parameters.
    fn parameters_schema(&self) -> Value;
}

/// Tool execution trait.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Execute the tool with the given call context and arguments.
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<Value>;
}

/// Combined trait for tools that provide both definition and execution.
pub trait UnifiedTool: ToolDefinitionTrait + ToolExecutable {}

impl<T: ToolDefinitionTrait + ToolExecutable> UnifiedTool for T {}

// ============================================================================
// UnifiedToolRegistry
// ============================================================================

/// Returned by `try_register` when a tool with the same name already exists.
///
/// Carries the rejected tool back to the caller so it can be reported.
pub struct RegistrationConflict {
    pub name: String,
    pub rejected: Arc<dyn UnifiedTool>,
}

impl std::fmt::Debug for RegistrationConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationConflict")
            .field("name", &self.name)
            .finish()
    }
}

/// Registry for `UnifiedTool` implementations.
///
/// O(1) lookup by name, iteration in insertion order.
#[derive(Default)]
pub struct UnifiedToolRegistry {
    tools: HashMap<String, Arc<dyn UnifiedTool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for UnifiedToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl UnifiedToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool only if the name is free. The first registration wins.
    pub fn try_register(&mut self, tool: Arc<dyn UnifiedTool>) -> Result<(), RegistrationConflict> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistrationConflict {
                name,
                rejected: tool,
            });
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn UnifiedTool>> {
        self.tools.get(name).cloned()
    }

    /// All tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Tools in registration order.
    pub fn tools(&self) -> Vec<Arc<dyn UnifiedTool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions as JSON values in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
