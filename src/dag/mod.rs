// src/dag/mod.rs

//! Dependency-graph representation of a workflow.
//!
//! - [`task_spec`] defines the immutable task model ([`TaskSpec`] and its
//!   executor payload).
//! - [`graph`] validates the dependency relation and computes topological
//!   layers (Kahn's algorithm); cycles and dangling references are rejected
//!   here, before anything runs.

pub mod graph;
pub mod task_spec;

pub use graph::WorkflowGraph;
pub use task_spec::{ServicePort, TaskName, TaskPayload, TaskSpec};
