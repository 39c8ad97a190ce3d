//! Tool-Call Approval
//!
//! Decision store, approval strategies and the gate that wraps tools.

pub mod gate;
pub mod models;
pub mod store;
pub mod strategy;

pub use gate::{ApprovalGate, GatedTool};
pub use models::{ApprovalRequest, ApprovalResponse, ApprovalScope, ApprovalState, AutoApprovedTool};
pub use store::{DecisionStore, InMemoryDecisionStore};
pub use strategy::{ApprovalPrompt, ApprovalStrategy, FnStrategy, InteractiveStrategy, StaticStrategy};
