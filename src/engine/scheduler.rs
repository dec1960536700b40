use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{TaskName, TaskSpec, WorkflowGraph};
use crate::errors::{FlowdagError, Result, TaskExecutionError};
use crate::exec::TaskExecutor;
use crate::metrics::MetricsSink;
use crate::status::{StatusPatch, StatusTracker, WorkflowPhase, WorkflowRun};

/// Outcome of a completed run, for hosts that consume results directly
/// instead of (or in addition to) the patch channel.
#[derive(Debug)]
pub struct RunReport {
    pub phase: WorkflowPhase,
    /// Materialized view after applying every emitted patch in order.
    pub run: WorkflowRun,
    /// Every patch emitted during the run, in emission order.
    pub patches: Vec<StatusPatch>,
}

/// Graph-directed workflow scheduler.
///
/// Owns nothing global: the executor and metrics sink are injected at
/// construction so tests can substitute both. One call to [`run`] drives one
/// workflow from validation to a terminal phase; per-run state lives in a
/// [`StatusTracker`] created inside the call and dropped when it returns.
///
/// [`run`]: Scheduler::run
pub struct Scheduler {
    executor: Arc<dyn TaskExecutor>,
    metrics: Arc<dyn MetricsSink>,
    patch_tx: Option<mpsc::UnboundedSender<StatusPatch>>,
}

impl Scheduler {
    pub fn new(executor: Arc<dyn TaskExecutor>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            executor,
            metrics,
            patch_tx: None,
        }
    }

    /// Forward every emitted patch over `tx`, in emission order.
    ///
    /// A closed receiver is logged and otherwise ignored; status reporting
    /// never changes scheduling decisions.
    pub fn with_patch_channel(mut self, tx: mpsc::UnboundedSender<StatusPatch>) -> Self {
        self.patch_tx = Some(tx);
        self
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    /// Run a workflow to a terminal phase.
    ///
    /// Fails fast on definition errors (cycles, unknown dependencies) before
    /// any task is dispatched. A required task's failure surfaces as
    /// [`FlowdagError::TaskExecution`] after the workflow is marked Failed;
    /// optional failures are recorded and the run continues.
    pub async fn run(&self, workflow: &str, specs: &[TaskSpec]) -> Result<WorkflowPhase> {
        self.run_report(workflow, specs).await.map(|report| report.phase)
    }

    /// Like [`run`], but returns the full patch log and final run view.
    ///
    /// [`run`]: Scheduler::run
    pub async fn run_report(&self, workflow: &str, specs: &[TaskSpec]) -> Result<RunReport> {
        let mut tracker = StatusTracker::new(workflow, Arc::clone(&self.metrics));
        let mut patches = Vec::new();

        let graph = match WorkflowGraph::build(specs) {
            Ok(graph) => graph,
            Err(err) => {
                // Definition error: fail the run with zero task dispatches
                // and an empty task map.
                error!(workflow, error = %err, "workflow rejected before execution");
                self.metrics.record_error(error_label(&err), workflow);
                self.emit(&mut patches, tracker.initialize_workflow());
                self.emit(&mut patches, tracker.finalize_workflow(WorkflowPhase::Failed)?);
                return Err(err);
            }
        };

        info!(
            workflow,
            tasks = graph.len(),
            layers = graph.layers().len(),
            "starting workflow run"
        );

        self.emit(&mut patches, tracker.initialize_workflow());
        self.emit(&mut patches, tracker.update_phase(WorkflowPhase::Running)?);

        // Names of tasks that reached any terminal status, and of tasks that
        // were handed to the executor at some point. The difference decides
        // what gets Cancelled on abort.
        let mut terminal: HashSet<TaskName> = HashSet::new();
        let mut dispatched: HashSet<TaskName> = HashSet::new();

        while terminal.len() < graph.len() {
            let wave: Vec<&TaskSpec> = graph
                .ready_tasks(&terminal)
                .into_iter()
                .filter(|spec| !dispatched.contains(&spec.name))
                .collect();

            if wave.is_empty() {
                // Unreachable after cycle validation; fail the workflow
                // rather than spin.
                error!(
                    workflow,
                    terminal = terminal.len(),
                    total = graph.len(),
                    "no executable tasks but run is not finished"
                );
                self.metrics.record_error("scheduler_deadlock", workflow);
                self.cancel_remaining(&mut tracker, &mut patches, &graph, &dispatched)?;
                self.emit(&mut patches, tracker.finalize_workflow(WorkflowPhase::Failed)?);
                return Err(FlowdagError::InvariantViolation {
                    workflow: workflow.to_string(),
                    detail: "ready set empty while tasks remain non-terminal".to_string(),
                });
            }

            let wave_names: Vec<&str> = wave.iter().map(|s| s.name.as_str()).collect();
            debug!(workflow, wave = ?wave_names, "dispatching wave");

            for spec in &wave {
                dispatched.insert(spec.name.clone());
                self.try_emit(&mut patches, tracker.start_task(&spec.name))?;
            }

            // Fan out the whole wave and join it before computing the next
            // one. In-flight siblings of a failed required task are not
            // cancelled; their outcomes are recorded below.
            let outcomes = join_all(wave.iter().map(|spec| {
                let executor = Arc::clone(&self.executor);
                async move {
                    let started = Instant::now();
                    let result = executor.execute(spec, workflow).await;
                    (*spec, started.elapsed(), result)
                }
            }))
            .await;

            let mut required_failure: Option<(TaskName, TaskExecutionError)> = None;

            for (spec, duration, result) in outcomes {
                terminal.insert(spec.name.clone());
                match result {
                    Ok(()) => {
                        self.metrics.record_task_execution(
                            spec.task_type(),
                            "success",
                            duration,
                            workflow,
                            &spec.name,
                        );
                        self.try_emit(&mut patches, tracker.complete_task(&spec.name))?;
                    }
                    Err(err) => {
                        self.metrics.record_task_execution(
                            spec.task_type(),
                            "failed",
                            duration,
                            workflow,
                            &spec.name,
                        );
                        self.try_emit(
                            &mut patches,
                            tracker.fail_task(&spec.name, err.to_string()),
                        )?;

                        if spec.optional {
                            warn!(
                                workflow,
                                task = %spec.name,
                                error = %err,
                                "optional task failed; run continues"
                            );
                            self.metrics
                                .record_retry(spec.task_type(), workflow, &spec.name);
                            self.metrics.record_error("optional_task_failed", workflow);
                        } else if required_failure.is_none() {
                            // First required failure decides the verdict;
                            // later siblings in the wave only get recorded.
                            required_failure = Some((spec.name.clone(), err));
                        }
                    }
                }
            }

            if let Some((task, err)) = required_failure {
                error!(workflow, task = %task, error = %err, "required task failed; aborting run");
                self.metrics.record_error("task_execution_failed", workflow);
                self.cancel_remaining(&mut tracker, &mut patches, &graph, &dispatched)?;
                self.emit(&mut patches, tracker.finalize_workflow(WorkflowPhase::Failed)?);
                return Err(FlowdagError::TaskExecution { task, source: err });
            }
        }

        self.emit(&mut patches, tracker.finalize_workflow(WorkflowPhase::Completed)?);
        info!(workflow, "workflow run completed");

        Ok(RunReport {
            phase: WorkflowPhase::Completed,
            run: tracker.run().clone(),
            patches,
        })
    }

    /// Mark every never-dispatched task Cancelled during an abort.
    fn cancel_remaining(
        &self,
        tracker: &mut StatusTracker,
        patches: &mut Vec<StatusPatch>,
        graph: &WorkflowGraph,
        dispatched: &HashSet<TaskName>,
    ) -> Result<()> {
        for spec in graph.specs() {
            if !dispatched.contains(&spec.name) {
                self.try_emit(patches, tracker.cancel_task(&spec.name))?;
            }
        }
        Ok(())
    }

    fn emit(&self, patches: &mut Vec<StatusPatch>, patch: StatusPatch) {
        if let Some(tx) = &self.patch_tx {
            if tx.send(patch.clone()).is_err() {
                warn!("patch receiver dropped; continuing without status forwarding");
            }
        }
        patches.push(patch);
    }

    fn try_emit(
        &self,
        patches: &mut Vec<StatusPatch>,
        patch: Result<StatusPatch>,
    ) -> Result<()> {
        self.emit(patches, patch?);
        Ok(())
    }
}

/// Metric label for a definition-level rejection.
fn error_label(err: &FlowdagError) -> &'static str {
    match err {
        FlowdagError::CyclicDependency { .. } => "cyclic_dependency",
        FlowdagError::UnknownDependency { .. } => "unknown_dependency",
        FlowdagError::DuplicateTask(_) => "duplicate_task",
        FlowdagError::UnsupportedTaskType { .. } => "unsupported_task_type",
        _ => "definition_error",
    }
}
