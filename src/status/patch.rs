// src/status/patch.rs

//! Status patch model: partial, mergeable views of a workflow run.
//!
//! Every state transition in [`super::tracker`] is expressed as a
//! [`StatusPatch`] with only the changed fields populated. The host persists
//! patches in emission order; [`WorkflowRun::apply`] defines the one true
//! merge (last-writer-wins per field, task entries merged per field).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow-level lifecycle phase.
///
/// Transitions are monotonic: Initializing → Running → {Completed, Failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowPhase {
    Initializing,
    Running,
    Completed,
    Failed,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowPhase::Completed | WorkflowPhase::Failed)
    }

    /// Ordering rank used by the tracker to reject backward transitions.
    pub(crate) fn rank(self) -> u8 {
        match self {
            WorkflowPhase::Initializing => 0,
            WorkflowPhase::Running => 1,
            WorkflowPhase::Completed | WorkflowPhase::Failed => 2,
        }
    }

    /// Stable lowercase label for metrics and logs.
    pub fn as_label(self) -> &'static str {
        match self {
            WorkflowPhase::Initializing => "initializing",
            WorkflowPhase::Running => "running",
            WorkflowPhase::Completed => "completed",
            WorkflowPhase::Failed => "failed",
        }
    }
}

/// Task-level lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Skipped
                | TaskStatus::Cancelled
        )
    }

    pub fn as_label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Partial update to one task's run record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// Present only when the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskPatch {
    /// Overlay `other` onto `self`, field by field.
    pub fn merge(&mut self, other: &TaskPatch) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.start_time.is_some() {
            self.start_time = other.start_time;
        }
        if other.completion_time.is_some() {
            self.completion_time = other.completion_time;
        }
        if other.error.is_some() {
            self.error = other.error.clone();
        }
    }
}

/// Partial update to a workflow run.
///
/// Only populated fields carry meaning; `tasks` entries are themselves
/// partial. Serialized shape matches the external status-store schema
/// (camelCase keys, ISO 8601 timestamps).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<WorkflowPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<String, TaskPatch>,
}

impl StatusPatch {
    /// Overlay `other` onto `self`: last writer wins per field, task entries
    /// merge recursively rather than replacing wholesale.
    pub fn merge(&mut self, other: &StatusPatch) {
        if other.phase.is_some() {
            self.phase = other.phase;
        }
        if other.start_time.is_some() {
            self.start_time = other.start_time;
        }
        if other.completion_time.is_some() {
            self.completion_time = other.completion_time;
        }
        for (name, patch) in &other.tasks {
            self.tasks
                .entry(name.clone())
                .or_default()
                .merge(patch);
        }
    }
}

/// Full run record for one task, as accumulated from patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Materialized view of a workflow run: the result of applying every emitted
/// patch in order to an empty run.
///
/// Owned by the [`super::StatusTracker`] for the duration of one run; it is
/// never shared across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub phase: WorkflowPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// Grows monotonically within a run; entries appear on a task's first
    /// transition out of Pending and are never removed.
    pub tasks: BTreeMap<String, TaskRun>,
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self {
            phase: WorkflowPhase::Initializing,
            start_time: None,
            completion_time: None,
            tasks: BTreeMap::new(),
        }
    }
}

impl WorkflowRun {
    /// Apply one patch, using the same per-field semantics as
    /// [`StatusPatch::merge`].
    pub fn apply(&mut self, patch: &StatusPatch) {
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if patch.start_time.is_some() {
            self.start_time = patch.start_time;
        }
        if patch.completion_time.is_some() {
            self.completion_time = patch.completion_time;
        }
        for (name, task_patch) in &patch.tasks {
            match self.tasks.get_mut(name) {
                Some(run) => {
                    if let Some(status) = task_patch.status {
                        run.status = status;
                    }
                    if task_patch.start_time.is_some() {
                        run.start_time = task_patch.start_time;
                    }
                    if task_patch.completion_time.is_some() {
                        run.completion_time = task_patch.completion_time;
                    }
                    if task_patch.error.is_some() {
                        run.error = task_patch.error.clone();
                    }
                }
                None => {
                    self.tasks.insert(
                        name.clone(),
                        TaskRun {
                            status: task_patch.status.unwrap_or(TaskStatus::Pending),
                            start_time: task_patch.start_time,
                            completion_time: task_patch.completion_time,
                            error: task_patch.error.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Status of a task, if it has appeared in any patch yet.
    pub fn task_status(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.get(name).map(|t| t.status)
    }
}
