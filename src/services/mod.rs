//! Services
//!
//! Business logic of the host: extensions, hooks, capabilities and approval.

pub mod approval;
pub mod capabilities;
pub mod extensions;
pub mod hooks;
