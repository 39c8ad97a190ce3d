//! Extension Manager
//!
//! Registers extensions, validates metadata and dependency constraints,
//! drives the activate/deactivate lifecycle and wires each extension's
//! handlers into the `HookDispatcher`.
//!
//! ## Lifecycle policy
//!
//! - Activation resolves the full dependency plan (missing dependencies,
//!   version ranges, host version, cycles) before any callback runs.
//! - A failing `extension:before_activate` hook or `activate` callback aborts
//!   the sequence and leaves that extension inactive. Dependencies activated
//!   earlier in the same plan stay active.
//! - Deactivation cascades dependents-first. It always leaves the extension
//!   inactive; a failing `deactivate` callback is reported to the caller.
//! - Lifecycle transitions are serialized by one manager-wide async mutex.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use semver::Version;
use serde_json::json;
use tokio::sync::Mutex;

use crate::services::extensions::context::{EventBus, ExtensionContext, RegistryView};
use crate::services::extensions::dependency::{DependencyNode, DependencyResolver};
use crate::services::extensions::models::{
    Extension, ExtensionDependencies, ExtensionInfo, ExtensionMetadata,
};
use crate::services::hooks::{HookContext, HookDispatcher, LifecycleHook};
use crate::utils::error::{HostError, HostResult};

// ============================================================================
// Registry state
// ============================================================================

struct ExtensionRecord {
    extension: Arc<dyn Extension>,
    metadata: ExtensionMetadata,
    version: Version,
    context: ExtensionContext,
    hooks: Vec<String>,
    active: bool,
}

impl ExtensionRecord {
    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            name: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            description: self.metadata.description.clone(),
            capabilities: self.metadata.capabilities.clone(),
            dependencies: self.metadata.dependencies.clone(),
            active: self.active,
            hooks: self.hooks.clone(),
        }
    }
}

/// Registered extensions plus registration and activation order.
#[derive(Default)]
pub struct RegistryState {
    records: HashMap<String, ExtensionRecord>,
    registration_order: Vec<String>,
    /// Active extensions, dependencies before dependents.
    activation_order: Vec<String>,
}

impl RegistryState {
    pub(crate) fn info(&self, id: &str) -> Option<ExtensionInfo> {
        self.records.get(id).map(ExtensionRecord::info)
    }

    pub(crate) fn infos(&self) -> Vec<ExtensionInfo> {
        self.registration_order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(ExtensionRecord::info)
            .collect()
    }

    pub(crate) fn is_active(&self, id: &str) -> bool {
        self.records.get(id).map(|r| r.active).unwrap_or(false)
    }

    fn nodes(&self) -> HashMap<&str, DependencyNode<'_>> {
        self.records
            .iter()
            .map(|(id, record)| {
                (
                    id.as_str(),
                    DependencyNode {
                        version: &record.version,
                        active: record.active,
                        requires: &record.metadata.dependencies.extensions,
                        min_host: record.metadata.dependencies.host.as_deref(),
                    },
                )
            })
            .collect()
    }

    fn set_active(&mut self, id: &str, active: bool) {
        if let Some(record) = self.records.get_mut(id) {
            record.active = active;
        }
        self.activation_order.retain(|existing| existing != id);
        if active {
            self.activation_order.push(id.to_string());
        }
    }
}

/// An active extension handed to the capability aggregator.
#[derive(Clone)]
pub struct ActiveExtension {
    pub id: String,
    pub extension: Arc<dyn Extension>,
    pub context: ExtensionContext,
}

// ============================================================================
// ExtensionManager
// ============================================================================

/// Owner of the extension registry and its lifecycle.
pub struct ExtensionManager {
    registry: Arc<RwLock<RegistryState>>,
    dispatcher: Arc<HookDispatcher>,
    events: EventBus,
    host_version: Version,
    lifecycle: Mutex<()>,
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ExtensionManager")
            .field("host_version", &self.host_version.to_string())
            .field("registered", &state.records.len())
            .field("active", &state.activation_order.len())
            .finish()
    }
}

impl ExtensionManager {
    /// Create a manager for the given host framework version.
    pub fn new(host_version: Version) -> Self {
        Self::with_dispatcher(host_version, Arc::new(HookDispatcher::new()))
    }

    /// Create a manager sharing an existing dispatcher.
    pub fn with_dispatcher(host_version: Version, dispatcher: Arc<HookDispatcher>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RegistryState::default())),
            dispatcher,
            events: EventBus::default(),
            host_version,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn host_version(&self) -> &Version {
        &self.host_version
    }

    pub fn dispatcher(&self) -> Arc<HookDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    fn validate_metadata(metadata: &ExtensionMetadata) -> HostResult<Version> {
        if metadata.name.trim().is_empty() {
            return Err(HostError::validation("Extension name must not be empty"));
        }
        if metadata.version.trim().is_empty() {
            return Err(HostError::validation(format!(
                "Extension '{}' has an empty version",
                metadata.name
            )));
        }
        let version = DependencyResolver::parse_version(&metadata.version)?;

        if let Some(host) = &metadata.dependencies.host {
            DependencyResolver::parse_version(host)?;
        }
        for (dependency, range) in &metadata.dependencies.extensions {
            if dependency.trim().is_empty() {
                return Err(HostError::validation(format!(
                    "Extension '{}' declares a dependency with an empty id",
                    metadata.name
                )));
            }
            DependencyResolver::parse_range(range)?;
        }
        Ok(version)
    }

    /// Register an extension.
    ///
    /// Validation happens before any state changes. The extension becomes
    /// queryable immediately and its hook handlers are wired into the dispatcher.
    pub fn register(&self, extension: Arc<dyn Extension>) -> HostResult<()> {
        let metadata = extension.metadata();
        let version = Self::validate_metadata(&metadata)?;
        let id = metadata.name.clone();

        let mut state = self.registry.write().unwrap_or_else(|e| e.into_inner());
        if state.records.contains_key(&id) {
            return Err(HostError::AlreadyRegistered(id));
        }

        let context = ExtensionContext::new(
            &id,
            RegistryView::new(Arc::downgrade(&self.registry)),
            self.events.clone(),
        );

        let mut hooks = Vec::new();
        for (hook_name, handler) in extension.hooks() {
            self.dispatcher.register(&hook_name, &id, handler);
            if !hooks.contains(&hook_name) {
                hooks.push(hook_name);
            }
        }

        tracing::info!(
            extension = %id,
            version = %version,
            hooks = hooks.len(),
            "registered extension"
        );

        state.records.insert(
            id.clone(),
            ExtensionRecord {
                extension,
                metadata,
                version,
                context,
                hooks,
                active: false,
            },
        );
        state.registration_order.push(id);
        Ok(())
    }

    /// Remove an extension, deactivating it (and its active dependents) first.
    pub async fn unregister(&self, id: &str) -> HostResult<()> {
        let _guard = self.lifecycle.lock().await;

        if !self.contains(id) {
            return Err(HostError::not_found(format!("Extension not found: {}", id)));
        }

        if self.is_active(id) {
            if let Err(e) = self.deactivate_cascade(id).await {
                tracing::warn!(extension = %id, error = %e, "deactivation failed during unregister");
            }
        }

        self.dispatcher.unregister_all(id);
        let mut state = self.registry.write().unwrap_or_else(|e| e.into_inner());
        state.records.remove(id);
        state.registration_order.retain(|existing| existing != id);
        state.activation_order.retain(|existing| existing != id);

        tracing::info!(extension = %id, "unregistered extension");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------------

    /// Check the host version and every declared dependency of `metadata`
    /// against the currently registered extensions.
    pub fn check_dependencies(&self, metadata: &ExtensionMetadata) -> HostResult<()> {
        DependencyResolver::check_host(
            &metadata.name,
            metadata.dependencies.host.as_deref(),
            &self.host_version,
        )?;

        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        for (dependency, range) in &metadata.dependencies.extensions {
            let resolved = state.records.get(dependency).map(|r| &r.version);
            DependencyResolver::check_requirement(&metadata.name, dependency, range, resolved)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Activate an extension and, first, any inactive dependencies.
    ///
    /// No-op if already active.
    pub async fn activate(&self, id: &str) -> HostResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.activate_locked(id).await
    }

    async fn activate_locked(&self, id: &str) -> HostResult<()> {
        let plan = {
            let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
            if state.is_active(id) {
                return Ok(());
            }
            DependencyResolver::plan_activation(id, &state.nodes(), &self.host_version)?
        };

        tracing::debug!(extension = %id, plan = ?plan, "activation plan resolved");

        for next in &plan {
            self.activate_one(next).await?;
        }
        Ok(())
    }

    async fn activate_one(&self, id: &str) -> HostResult<()> {
        let (extension, context, version) = self.record_handles(id)?;
        let hook_ctx = HookContext::new(json!({ "extension": id, "version": version }));

        self.dispatcher
            .execute(LifecycleHook::BeforeActivate.as_str(), hook_ctx.clone())
            .await?;

        if let Err(message) = extension.activate(&context).await {
            tracing::error!(extension = %id, error = %message, "activation failed");
            return Err(HostError::ActivationFailed {
                extension: id.to_string(),
                message,
            });
        }

        {
            let mut state = self.registry.write().unwrap_or_else(|e| e.into_inner());
            state.set_active(id, true);
        }
        tracing::info!(extension = %id, "activated extension");

        if let Err(e) = self
            .dispatcher
            .execute(LifecycleHook::AfterActivate.as_str(), hook_ctx)
            .await
        {
            tracing::warn!(extension = %id, error = %e, "post-activation hook failed");
        }
        Ok(())
    }

    /// Activate every registered extension in registration order.
    pub async fn activate_all(&self) -> HostResult<()> {
        let _guard = self.lifecycle.lock().await;
        let ids = {
            let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
            state.registration_order.clone()
        };
        for id in ids {
            self.activate_locked(&id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deactivation
    // ------------------------------------------------------------------------

    /// Deactivate an extension after deactivating its active dependents.
    ///
    /// No-op if the extension is registered but inactive.
    pub async fn deactivate(&self, id: &str) -> HostResult<()> {
        let _guard = self.lifecycle.lock().await;
        if !self.contains(id) {
            return Err(HostError::not_found(format!("Extension not found: {}", id)));
        }
        if !self.is_active(id) {
            return Ok(());
        }
        self.deactivate_cascade(id).await
    }

    async fn deactivate_cascade(&self, id: &str) -> HostResult<()> {
        let order = {
            let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
            DependencyResolver::teardown_order(id, &state.activation_order, |other| {
                state
                    .records
                    .get(other)
                    .map(|r| r.metadata.dependencies.extensions.keys().cloned().collect())
                    .unwrap_or_default()
            })
        };

        let mut first_error = None;
        for next in &order {
            if let Err(e) = self.deactivate_one(next).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn deactivate_one(&self, id: &str) -> HostResult<()> {
        let (extension, context, version) = self.record_handles(id)?;
        let hook_ctx = HookContext::new(json!({ "extension": id, "version": version }));

        if let Err(e) = self
            .dispatcher
            .execute(LifecycleHook::BeforeDeactivate.as_str(), hook_ctx.clone())
            .await
        {
            tracing::warn!(extension = %id, error = %e, "pre-deactivation hook failed");
        }

        let outcome = extension.deactivate(&context).await;

        {
            let mut state = self.registry.write().unwrap_or_else(|e| e.into_inner());
            state.set_active(id, false);
        }
        tracing::info!(extension = %id, "deactivated extension");

        if let Err(e) = self
            .dispatcher
            .execute(LifecycleHook::AfterDeactivate.as_str(), hook_ctx)
            .await
        {
            tracing::warn!(extension = %id, error = %e, "post-deactivation hook failed");
        }

        outcome.map_err(|message| {
            tracing::error!(extension = %id, error = %message, "deactivate callback failed");
            HostError::ActivationFailed {
                extension: id.to_string(),
                message,
            }
        })
    }

    // ------------------------------------------------------------------------
    // Framework lifecycle
    // ------------------------------------------------------------------------

    /// Raise `framework:init`.
    pub async fn initialize(&self) -> HostResult<()> {
        tracing::info!(host_version = %self.host_version, "initializing extension host");
        self.execute_hook(
            LifecycleHook::FrameworkInit.as_str(),
            HookContext::new(json!({ "host_version": self.host_version.to_string() })),
        )
        .await
    }

    /// Deactivate every active extension in reverse activation order, then
    /// raise `framework:shutdown`.
    ///
    /// Individual deactivation failures are logged and do not stop the teardown.
    pub async fn shutdown(&self) -> HostResult<()> {
        let _guard = self.lifecycle.lock().await;
        let order: Vec<String> = {
            let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
            state.activation_order.iter().rev().cloned().collect()
        };

        for id in &order {
            if let Err(e) = self.deactivate_one(id).await {
                tracing::warn!(extension = %id, error = %e, "deactivation failed during shutdown");
            }
        }

        tracing::info!(deactivated = order.len(), "shutting down extension host");
        self.execute_hook(
            LifecycleHook::FrameworkShutdown.as_str(),
            HookContext::new(json!({ "host_version": self.host_version.to_string() })),
        )
        .await
    }

    /// Raise any hook by name.
    pub async fn execute_hook(&self, hook_name: &str, ctx: HookContext) -> HostResult<()> {
        self.dispatcher.execute(hook_name, ctx).await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn record_handles(&self, id: &str) -> HostResult<(Arc<dyn Extension>, ExtensionContext, String)> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .get(id)
            .map(|r| {
                (
                    Arc::clone(&r.extension),
                    r.context.clone(),
                    r.metadata.version.clone(),
                )
            })
            .ok_or_else(|| HostError::not_found(format!("Extension not found: {}", id)))
    }

    fn contains(&self, id: &str) -> bool {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.records.contains_key(id)
    }

    /// All registered extensions in registration order.
    pub fn list(&self) -> Vec<ExtensionInfo> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.infos()
    }

    pub fn get(&self, id: &str) -> Option<ExtensionInfo> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.info(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.is_active(id)
    }

    pub fn get_dependencies(&self, id: &str) -> Option<ExtensionDependencies> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .get(id)
            .map(|r| r.metadata.dependencies.clone())
    }

    /// Active extension ids, dependencies before dependents.
    pub fn activation_order(&self) -> Vec<String> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.activation_order.clone()
    }

    /// Active extensions with their contexts, in activation order.
    pub fn active_extensions(&self) -> Vec<ActiveExtension> {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state
            .activation_order
            .iter()
            .filter_map(|id| {
                state.records.get(id).map(|r| ActiveExtension {
                    id: id.clone(),
                    extension: Arc::clone(&r.extension),
                    context: r.context.clone(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        let state = self.registry.read().unwrap_or_else(|e| e.into_inner());
        state.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
