//! Extension Host Core
//!
//! Foundational traits and error types shared by the Extension Host workspace.
//! This crate has no dependency on the extension manager, the approval gate or
//! any storage engine.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Tool call context (`ExecutionContext`, `ToolContext`)
//! - `tool_trait` - Unified tool abstraction (`ToolDefinitionTrait`, `ToolExecutable`, `UnifiedTool`)

pub mod context;
pub mod error;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Tool Call Context ──────────────────────────────────────────────────
pub use context::{ExecutionContext, ToolContext};

// ── Unified Tool Trait ─────────────────────────────────────────────────
pub use tool_trait::{
    RegistrationConflict, ToolDefinitionTrait, ToolExecutable, UnifiedTool, UnifiedToolRegistry,
};
