// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Definition errors (cycles, dangling references, unknown task kinds) are
//! detected before any task is dispatched. Execution errors carry the
//! [`TaskExecutionError`] of the failed required task. `InvalidTransition`
//! and `InvariantViolation` signal scheduler/tracker bugs rather than domain
//! conditions; they are never swallowed.

use thiserror::Error;

/// Failure reported by a [`crate::exec::TaskExecutor`] for a single task.
///
/// The scheduler treats any value of this type as "the task failed" and does
/// not inspect the cause; the message is recorded in the task's status patch.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TaskExecutionError {
    pub message: String,
}

impl TaskExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("cycle detected in task dependencies involving task '{task}'")]
    CyclicDependency { task: String },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("duplicate task name '{0}'")]
    DuplicateTask(String),

    #[error("unsupported task kind '{kind}' for task '{task}'")]
    UnsupportedTaskType { task: String, kind: String },

    #[error("required task '{task}' failed: {source}")]
    TaskExecution {
        task: String,
        #[source]
        source: TaskExecutionError,
    },

    #[error("invalid status transition for '{subject}': {detail}")]
    InvalidTransition { subject: String, detail: String },

    #[error("scheduler invariant violated in workflow '{workflow}': {detail}")]
    InvariantViolation { workflow: String, detail: String },

    #[error("workflow definition error: {0}")]
    Definition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlowdagError>;
