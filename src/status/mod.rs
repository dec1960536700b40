// src/status/mod.rs

//! Workflow and task status tracking.
//!
//! - [`patch`] defines the partial, mergeable [`StatusPatch`] exchanged with
//!   the external status store and the [`WorkflowRun`] view built from it.
//! - [`tracker`] owns the two-level state machine (workflow phase plus
//!   per-task status) and emits one patch per transition.

pub mod patch;
pub mod tracker;

pub use patch::{StatusPatch, TaskPatch, TaskRun, TaskStatus, WorkflowPhase, WorkflowRun};
pub use tracker::StatusTracker;
