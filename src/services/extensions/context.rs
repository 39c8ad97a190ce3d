//! Extension Context
//!
//! Per-extension handle passed to `activate`, `deactivate` and `tools`:
//! a tagged logger, a read-only view of the registry and the shared event bus.

use std::sync::{RwLock, Weak};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::services::extensions::models::ExtensionInfo;
use crate::services::extensions::manager::RegistryState;

/// Default capacity of the event bus channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// Logger
// ============================================================================

/// Logger that tags every record with the owning extension id.
#[derive(Debug, Clone)]
pub struct ExtensionLogger {
    extension_id: String,
}

impl ExtensionLogger {
    pub fn new(extension_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(extension = %self.extension_id, "{}", message);
    }

    pub fn info(&self, message: &str) {
        tracing::info!(extension = %self.extension_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(extension = %self.extension_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(extension = %self.extension_id, "{}", message);
    }
}

// ============================================================================
// Event bus
// ============================================================================

/// Event published by an extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionEvent {
    pub name: String,
    /// Id of the emitting extension.
    pub source: String,
    pub payload: Value,
}

/// Broadcast channel shared by all extensions of one manager.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExtensionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn emit(&self, source: &str, name: &str, payload: Value) -> usize {
        let event = ExtensionEvent {
            name: name.to_string(),
            source: source.to_string(),
            payload,
        };
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

// ============================================================================
// Registry view
// ============================================================================

/// Read-only accessors over the manager's registry.
///
/// Holds a weak reference; once the manager is dropped every query returns
/// an empty answer.
#[derive(Clone)]
pub struct RegistryView {
    registry: Weak<RwLock<RegistryState>>,
}

impl std::fmt::Debug for RegistryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryView")
            .field("attached", &(self.registry.strong_count() > 0))
            .finish()
    }
}

impl RegistryView {
    pub(crate) fn new(registry: Weak<RwLock<RegistryState>>) -> Self {
        Self { registry }
    }

    pub fn get_extension(&self, id: &str) -> Option<ExtensionInfo> {
        let registry = self.registry.upgrade()?;
        let state = registry.read().unwrap_or_else(|e| e.into_inner());
        state.info(id)
    }

    pub fn list_extensions(&self) -> Vec<ExtensionInfo> {
        match self.registry.upgrade() {
            Some(registry) => {
                let state = registry.read().unwrap_or_else(|e| e.into_inner());
                state.infos()
            }
            None => Vec::new(),
        }
    }

    pub fn is_extension_active(&self, id: &str) -> bool {
        match self.registry.upgrade() {
            Some(registry) => {
                let state = registry.read().unwrap_or_else(|e| e.into_inner());
                state.is_active(id)
            }
            None => false,
        }
    }
}

// ============================================================================
// ExtensionContext
// ============================================================================

/// Context built for each extension at registration.
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    extension_id: String,
    logger: ExtensionLogger,
    registry: RegistryView,
    events: EventBus,
}

impl ExtensionContext {
    pub(crate) fn new(extension_id: &str, registry: RegistryView, events: EventBus) -> Self {
        Self {
            extension_id: extension_id.to_string(),
            logger: ExtensionLogger::new(extension_id),
            registry,
            events,
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn logger(&self) -> &ExtensionLogger {
        &self.logger
    }

    pub fn get_extension(&self, id: &str) -> Option<ExtensionInfo> {
        self.registry.get_extension(id)
    }

    pub fn list_extensions(&self) -> Vec<ExtensionInfo> {
        self.registry.list_extensions()
    }

    pub fn is_extension_active(&self, id: &str) -> bool {
        self.registry.is_extension_active(id)
    }

    /// Publish an event tagged with this extension's id.
    pub fn emit(&self, name: &str, payload: Value) -> usize {
        self.events.emit(&self.extension_id, name, payload)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionEvent> {
        self.events.subscribe()
    }
}
