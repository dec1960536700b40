// src/engine/handlers.rs

//! Pure lifecycle entry points.
//!
//! The event-delivery mechanism (controller runtime, message bus, CLI) lives
//! entirely outside the core: an adapter translates its events into calls to
//! these functions, which take plain data and return a result. No handler
//! registers itself anywhere.

use std::sync::Arc;

use tracing::{info, warn};

use crate::dag::{TaskName, TaskSpec};
use crate::errors::{FlowdagError, Result};
use crate::exec::TaskExecutor;
use crate::metrics::MetricsSink;
use crate::status::WorkflowPhase;

use super::Scheduler;

/// Handle creation of a workflow: record the start and run it to a terminal
/// phase.
pub async fn on_create(
    scheduler: &Scheduler,
    workflow: &str,
    specs: &[TaskSpec],
) -> Result<WorkflowPhase> {
    scheduler.metrics().record_workflow_start(workflow);
    scheduler.run(workflow, specs).await
}

/// Handle deletion of a workflow: clean up every task's resources.
///
/// Cleanup is attempted for all tasks even when one fails; the first failure
/// is reported after the sweep. Absent resources are success (the executor
/// contract), so deleting a never-run or half-run workflow is safe.
pub async fn on_delete(
    executor: &Arc<dyn TaskExecutor>,
    metrics: &Arc<dyn MetricsSink>,
    workflow: &str,
    tasks: &[TaskName],
) -> Result<()> {
    let mut first_failure: Option<(TaskName, crate::errors::TaskExecutionError)> = None;

    for task in tasks {
        if let Err(err) = executor.cleanup(task, workflow).await {
            warn!(workflow, task = %task, error = %err, "task cleanup failed");
            metrics.record_error("cleanup_failed", workflow);
            if first_failure.is_none() {
                first_failure = Some((task.clone(), err));
            }
        }
    }

    metrics.record_workflow_deletion(workflow);
    info!(workflow, tasks = tasks.len(), "workflow deleted");

    match first_failure {
        None => Ok(()),
        Some((task, source)) => Err(FlowdagError::TaskExecution { task, source }),
    }
}

/// Handle host restart: re-run the workflow iff its last known phase is
/// non-terminal.
///
/// Task-level state from the previous attempt is not restored; the executor
/// contract requires idempotent re-execution of already-completed tasks.
pub async fn on_resume(
    scheduler: &Scheduler,
    workflow: &str,
    specs: &[TaskSpec],
    last_phase: Option<WorkflowPhase>,
) -> Result<WorkflowPhase> {
    match last_phase {
        Some(phase) if phase.is_terminal() => {
            info!(workflow, phase = phase.as_label(), "workflow already terminal; not resuming");
            Ok(phase)
        }
        _ => on_create(scheduler, workflow, specs).await,
    }
}
