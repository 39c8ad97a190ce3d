//! Well-known hook names.
//!
//! Extensions may also register handlers under arbitrary custom names; these
//! are only the points the host itself raises.

use serde::{Deserialize, Serialize};

/// Lifecycle points raised by the host through the hook dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleHook {
    FrameworkInit,
    FrameworkShutdown,
    BeforeActivate,
    AfterActivate,
    BeforeDeactivate,
    AfterDeactivate,
    BeforeGeneration,
    AfterGeneration,
    BeforeToolCall,
    AfterToolCall,
}

impl LifecycleHook {
    /// Every lifecycle hook, in the order the host typically raises them.
    pub const ALL: [LifecycleHook; 10] = [
        LifecycleHook::FrameworkInit,
        LifecycleHook::BeforeActivate,
        LifecycleHook::AfterActivate,
        LifecycleHook::BeforeGeneration,
        LifecycleHook::AfterGeneration,
        LifecycleHook::BeforeToolCall,
        LifecycleHook::AfterToolCall,
        LifecycleHook::BeforeDeactivate,
        LifecycleHook::AfterDeactivate,
        LifecycleHook::FrameworkShutdown,
    ];

    /// Hook name used for registration and dispatch.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::FrameworkInit => "framework:init",
            LifecycleHook::FrameworkShutdown => "framework:shutdown",
            LifecycleHook::BeforeActivate => "extension:before_activate",
            LifecycleHook::AfterActivate => "extension:after_activate",
            LifecycleHook::BeforeDeactivate => "extension:before_deactivate",
            LifecycleHook::AfterDeactivate => "extension:after_deactivate",
            LifecycleHook::BeforeGeneration => "generation:before",
            LifecycleHook::AfterGeneration => "generation:after",
            LifecycleHook::BeforeToolCall => "tool:before_call",
            LifecycleHook::AfterToolCall => "tool:after_call",
        }
    }

    /// Reverse lookup from a hook name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|hook| hook.as_str() == name)
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
