//! Capabilities
//!
//! Tool and middleware contributions merged across active extensions.

pub mod aggregator;
pub mod middleware;

pub use aggregator::{AggregatedTools, CapabilityAggregator, ToolCollision};
pub use middleware::{ExtensionMiddleware, MiddlewarePoint, UnifiedMiddleware};
