//! Utilities
//!
//! Common utilities used throughout the host.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::*;
pub use logging::*;
pub use paths::*;
