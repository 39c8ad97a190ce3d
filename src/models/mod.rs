//! Data Models
//!
//! Serializable configuration shared by the host and its storage layer.

pub mod settings;
