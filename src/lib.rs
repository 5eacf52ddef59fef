//! Split a test suite across parallel CI nodes and run this node's share
//! with bounded retries.
//!
//! Every node runs one instance of the tool. Nodes agree on a partition of
//! the suite through a test plan stored by the coordination service under a
//! shared run identifier; when that service cannot be reached each node
//! computes the same partition locally.
//!
//! # Modules
//!
//! - [`config`]: command-line/environment configuration and validation
//! - [`api`]: HTTP client for the coordination service
//! - [`plan`]: plan types, request building, fallback partitioning and plan resolution
//! - [`runner`]: the [`runner::TestRunner`] trait and its framework adapters
//! - [`retry`]: the retry-execution controller and its timeline
//! - [`app`]: wires the pieces together and maps outcomes to exit codes

pub mod api;
pub mod app;
pub mod config;
pub mod plan;
pub mod retry;
pub mod runner;

#[cfg(test)]
pub(crate) mod test_support;

/// Version reported to the coordination service and printed by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
