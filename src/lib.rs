//! Extension Host - Rust Library
//!
//! Host framework for composing pluggable behavior into an agent runtime and
//! gating every tool call behind an approval decision. It includes:
//! - Extension lifecycle management with dependency-ordered activation
//! - Hook dispatch with isolated failure reporting
//! - Capability aggregation (tools and middleware)
//! - The tool-call approval gate and its decision stores
//! - Storage layer (SQLite, JSON config) and utilities

pub mod host;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use extension_host_core::{
    CoreError, CoreResult, ExecutionContext, ToolContext, ToolDefinitionTrait, ToolExecutable,
    UnifiedTool, UnifiedToolRegistry,
};
pub use host::ExtensionHost;
pub use models::settings::{DecisionStoreKind, HostConfig, HostConfigUpdate, HOST_VERSION};
pub use utils::error::{HostError, HostResult};
