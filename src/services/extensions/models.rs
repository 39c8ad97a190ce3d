//! Extension Models
//!
//! Metadata, capability flags and the `Extension` contract implemented by
//! extension authors.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use extension_host_core::UnifiedTool;
use serde::{Deserialize, Serialize};

use crate::services::capabilities::ExtensionMiddleware;
use crate::services::extensions::context::ExtensionContext;
use crate::services::hooks::HookHandler;

// ============================================================================
// Metadata
// ============================================================================

/// What an extension contributes to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionCapability {
    Tools,
    Hooks,
    Middleware,
    Events,
}

/// Declared dependencies of an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDependencies {
    /// Minimum host framework version (plain semver, e.g. "0.1.0").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Extension id -> semver range (e.g. ">=1.0.0", "^2").
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl ExtensionDependencies {
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.extensions.is_empty()
    }
}

/// Identity and declarations of an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    /// Unique id of the extension.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<ExtensionCapability>,
    #[serde(default)]
    pub dependencies: ExtensionDependencies,
}

impl ExtensionMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            capabilities: Vec::new(),
            dependencies: ExtensionDependencies::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capability(mut self, capability: ExtensionCapability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Require at least `min_version` of the host framework.
    pub fn requires_host(mut self, min_version: impl Into<String>) -> Self {
        self.dependencies.host = Some(min_version.into());
        self
    }

    /// Depend on extension `id` within the semver `range`.
    pub fn depends_on(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.extensions.insert(id.into(), range.into());
        self
    }

    pub fn has_capability(&self, capability: ExtensionCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Read-only snapshot of a registered extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub capabilities: Vec<ExtensionCapability>,
    pub dependencies: ExtensionDependencies,
    pub active: bool,
    /// Hooks this extension registered handlers for.
    pub hooks: Vec<String>,
}

// ============================================================================
// Extension contract
// ============================================================================

/// A self-contained unit contributing hooks, tools, middleware and lifecycle
/// behavior to the host.
///
/// Every method except `metadata` has a no-op default.
#[async_trait]
pub trait Extension: Send + Sync {
    fn metadata(&self) -> ExtensionMetadata;

    /// Hook handlers keyed by hook name. Read once at registration.
    fn hooks(&self) -> Vec<(String, HookHandler)> {
        Vec::new()
    }

    async fn activate(&self, _ctx: &ExtensionContext) -> Result<(), String> {
        Ok(())
    }

    async fn deactivate(&self, _ctx: &ExtensionContext) -> Result<(), String> {
        Ok(())
    }

    /// Tools exposed while the extension is active.
    fn tools(&self, _ctx: &ExtensionContext) -> Vec<Arc<dyn UnifiedTool>> {
        Vec::new()
    }

    fn middleware(&self) -> Option<Arc<dyn ExtensionMiddleware>> {
        None
    }
}
