// src/exec/mod.rs

//! Task execution layer.
//!
//! The scheduler talks to a [`TaskExecutor`] trait object instead of a
//! concrete runner, so tests can substitute a fake that scripts outcomes
//! without spawning anything. [`process`] provides the local implementation
//! used by the CLI.

pub mod process;

use async_trait::async_trait;

use crate::dag::TaskSpec;
use crate::errors::TaskExecutionError;

/// Executes a single task given its spec and the owning workflow's name.
///
/// Implementations must be idempotent under re-execution: after a host
/// restart the whole workflow is re-run with the same specs, and
/// already-completed tasks will be executed again.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one task to completion. Any error is treated by the scheduler as
    /// a task failure, subject to the task's `optional` flag.
    async fn execute(&self, spec: &TaskSpec, workflow: &str) -> Result<(), TaskExecutionError>;

    /// Remove whatever `execute` created for this task.
    ///
    /// Idempotent: absence of the underlying resource is success, not an
    /// error.
    async fn cleanup(&self, task: &str, workflow: &str) -> Result<(), TaskExecutionError>;
}

pub use process::LocalProcessExecutor;
