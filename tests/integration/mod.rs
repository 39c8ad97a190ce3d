//! Integration Tests Module
//!
//! End-to-end tests for the extension host: dependency-ordered lifecycle,
//! hook dispatch, the approval gate with both decision stores, and the host
//! facade wiring them together.

// Shared fixtures (extensions, tools, strategies)
mod support;



// Approval gate scopes, persistence and cancellation
mod approval_test;

// Host facade: config, aggregation, gated tool calls
mod host_test;
