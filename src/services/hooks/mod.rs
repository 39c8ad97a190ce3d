//! Hook Dispatch
//!
//! Named lifecycle events with handlers contributed by extensions.
//!
//! - `lifecycle` - Well-known hook names raised by the host
//! - `dispatcher` - Registration, concurrent fan-out and failure aggregation

pub mod dispatcher;
pub mod lifecycle;

pub use dispatcher::{hook_handler, HookContext, HookDispatcher, HookFuture, HookHandler, HookSummary};
pub use lifecycle::LifecycleHook;
