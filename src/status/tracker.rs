// src/status/tracker.rs

//! Workflow/task state machine, expressed as a sequence of patches.
//!
//! Every transition returns the [`StatusPatch`] it produced (already applied
//! to the tracker's own [`WorkflowRun`]), so callers can forward patches to
//! an external store, log them, or replay them in tests. Backward moves out
//! of a terminal status are rejected with `InvalidTransition`; that choice is
//! deterministic and indicates a scheduler bug, not a domain condition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::errors::{FlowdagError, Result};
use crate::metrics::MetricsSink;
use crate::status::patch::{StatusPatch, TaskPatch, TaskStatus, WorkflowPhase, WorkflowRun};

/// Tracks the state of a single workflow run.
///
/// Holds no external resources; the only side effect is the single
/// `record_workflow_completion` call in [`finalize_workflow`].
///
/// [`finalize_workflow`]: StatusTracker::finalize_workflow
pub struct StatusTracker {
    workflow_name: String,
    metrics: Arc<dyn MetricsSink>,
    run: WorkflowRun,
    finalized: bool,
}

impl StatusTracker {
    pub fn new(workflow_name: impl Into<String>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            metrics,
            run: WorkflowRun::default(),
            finalized: false,
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Current materialized view of the run.
    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    /// Reset to phase Initializing with an empty task map.
    ///
    /// Idempotent: any prior patch history for this name is discarded, so a
    /// re-invocation after a host restart starts from a clean slate.
    pub fn initialize_workflow(&mut self) -> StatusPatch {
        self.run = WorkflowRun::default();
        self.finalized = false;

        let patch = StatusPatch {
            phase: Some(WorkflowPhase::Initializing),
            start_time: Some(Utc::now()),
            ..StatusPatch::default()
        };
        self.run.apply(&patch);
        debug!(workflow = %self.workflow_name, "workflow initialized");
        patch
    }

    /// Move the workflow to `phase`.
    ///
    /// Rejects backward transitions and any transition out of a terminal
    /// phase, including terminal-to-same-terminal repeats.
    pub fn update_phase(&mut self, phase: WorkflowPhase) -> Result<StatusPatch> {
        let current = self.run.phase;
        if current.is_terminal() || phase.rank() < current.rank() {
            return Err(FlowdagError::InvalidTransition {
                subject: self.workflow_name.clone(),
                detail: format!("workflow phase {current:?} -> {phase:?}"),
            });
        }

        let patch = StatusPatch {
            phase: Some(phase),
            ..StatusPatch::default()
        };
        self.run.apply(&patch);
        debug!(workflow = %self.workflow_name, phase = phase.as_label(), "phase updated");
        Ok(patch)
    }

    /// Mark a task Running with a start time.
    ///
    /// Only valid for tasks that have not entered the run yet (or are still
    /// Pending); anything else is a scheduler bug.
    pub fn start_task(&mut self, task: &str) -> Result<StatusPatch> {
        match self.run.task_status(task) {
            None | Some(TaskStatus::Pending) => {}
            Some(current) => {
                return Err(FlowdagError::InvalidTransition {
                    subject: task.to_string(),
                    detail: format!("task status {current:?} -> Running"),
                });
            }
        }

        let patch = self.task_patch(
            task,
            TaskPatch {
                status: Some(TaskStatus::Running),
                start_time: Some(Utc::now()),
                ..TaskPatch::default()
            },
        );
        debug!(workflow = %self.workflow_name, task, "task started");
        Ok(patch)
    }

    pub fn complete_task(&mut self, task: &str) -> Result<StatusPatch> {
        self.terminal_task_patch(task, TaskStatus::Completed, None)
    }

    pub fn fail_task(&mut self, task: &str, error: impl Into<String>) -> Result<StatusPatch> {
        self.terminal_task_patch(task, TaskStatus::Failed, Some(error.into()))
    }

    pub fn skip_task(&mut self, task: &str) -> Result<StatusPatch> {
        self.terminal_task_patch(task, TaskStatus::Skipped, None)
    }

    pub fn cancel_task(&mut self, task: &str) -> Result<StatusPatch> {
        self.terminal_task_patch(task, TaskStatus::Cancelled, None)
    }

    /// Terminal phase + completion time; reports the run's duration to the
    /// metrics sink exactly once.
    pub fn finalize_workflow(&mut self, phase: WorkflowPhase) -> Result<StatusPatch> {
        if !phase.is_terminal() {
            return Err(FlowdagError::InvalidTransition {
                subject: self.workflow_name.clone(),
                detail: format!("finalize with non-terminal phase {phase:?}"),
            });
        }
        if self.finalized {
            return Err(FlowdagError::InvalidTransition {
                subject: self.workflow_name.clone(),
                detail: "workflow already finalized".to_string(),
            });
        }

        let completion_time = Utc::now();
        let duration = self
            .run
            .start_time
            .and_then(|start| (completion_time - start).to_std().ok())
            .unwrap_or(Duration::ZERO);

        let patch = StatusPatch {
            phase: Some(phase),
            completion_time: Some(completion_time),
            ..StatusPatch::default()
        };
        self.run.apply(&patch);
        self.finalized = true;

        self.metrics
            .record_workflow_completion(&self.workflow_name, phase, duration);
        debug!(
            workflow = %self.workflow_name,
            phase = phase.as_label(),
            duration_ms = duration.as_millis() as u64,
            "workflow finalized"
        );
        Ok(patch)
    }

    fn terminal_task_patch(
        &mut self,
        task: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<StatusPatch> {
        if let Some(current) = self.run.task_status(task) {
            if current.is_terminal() {
                return Err(FlowdagError::InvalidTransition {
                    subject: task.to_string(),
                    detail: format!("task status {current:?} -> {status:?}"),
                });
            }
        }

        let patch = self.task_patch(
            task,
            TaskPatch {
                status: Some(status),
                completion_time: Some(Utc::now()),
                error,
                ..TaskPatch::default()
            },
        );
        debug!(
            workflow = %self.workflow_name,
            task,
            status = status.as_label(),
            "task reached terminal status"
        );
        Ok(patch)
    }

    fn task_patch(&mut self, task: &str, task_patch: TaskPatch) -> StatusPatch {
        let mut tasks = BTreeMap::new();
        tasks.insert(task.to_string(), task_patch);
        let patch = StatusPatch {
            tasks,
            ..StatusPatch::default()
        };
        self.run.apply(&patch);
        patch
    }
}
