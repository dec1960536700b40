// src/metrics/mod.rs

//! Metrics abstraction consumed by the scheduler and status tracker.
//!
//! Sinks are side-effect only: no method can fail or otherwise influence
//! scheduling. Implementations must absorb their own errors (log and move
//! on) and tolerate concurrent calls from multiple workflow runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

use crate::status::WorkflowPhase;

/// Receiver for workflow/task lifecycle metrics.
pub trait MetricsSink: Send + Sync {
    fn record_workflow_start(&self, workflow: &str);

    fn record_workflow_completion(&self, workflow: &str, phase: WorkflowPhase, duration: Duration);

    fn record_workflow_deletion(&self, workflow: &str);

    fn record_task_execution(
        &self,
        task_type: &str,
        status: &str,
        duration: Duration,
        workflow: &str,
        task: &str,
    );

    fn record_error(&self, error_type: &str, workflow: &str);

    fn record_retry(&self, task_type: &str, workflow: &str, task: &str);
}

/// Production default for the CLI: emits structured `tracing` events and
/// keeps no state.
#[derive(Debug, Default)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn record_workflow_start(&self, workflow: &str) {
        info!(workflow, "metric: workflow started");
    }

    fn record_workflow_completion(&self, workflow: &str, phase: WorkflowPhase, duration: Duration) {
        info!(
            workflow,
            phase = phase.as_label(),
            duration_ms = duration.as_millis() as u64,
            "metric: workflow completed"
        );
    }

    fn record_workflow_deletion(&self, workflow: &str) {
        info!(workflow, "metric: workflow deleted");
    }

    fn record_task_execution(
        &self,
        task_type: &str,
        status: &str,
        duration: Duration,
        workflow: &str,
        task: &str,
    ) {
        info!(
            task_type,
            status,
            duration_ms = duration.as_millis() as u64,
            workflow,
            task,
            "metric: task executed"
        );
    }

    fn record_error(&self, error_type: &str, workflow: &str) {
        info!(error_type, workflow, "metric: error recorded");
    }

    fn record_retry(&self, task_type: &str, workflow: &str, task: &str) {
        info!(task_type, workflow, task, "metric: retry recorded");
    }
}

/// In-memory counters, safe under concurrent increment from multiple runs.
///
/// Label sets are flattened into string keys (`task_type/status/workflow`
/// and similar). The `active_workflows` gauge saturates at zero on
/// decrement: deleting a workflow that already completed decrements twice.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    workflow_starts: AtomicU64,
    active_workflows: AtomicU64,
    workflow_deletions: AtomicU64,
    workflow_completions: Mutex<BTreeMap<String, u64>>,
    workflow_durations: Mutex<BTreeMap<String, Duration>>,
    task_executions: Mutex<BTreeMap<String, u64>>,
    task_durations: Mutex<BTreeMap<String, Duration>>,
    errors: Mutex<BTreeMap<String, u64>>,
    retries: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow_starts(&self) -> u64 {
        self.workflow_starts.load(Ordering::Relaxed)
    }

    pub fn active_workflows(&self) -> u64 {
        self.active_workflows.load(Ordering::Relaxed)
    }

    pub fn workflow_deletions(&self) -> u64 {
        self.workflow_deletions.load(Ordering::Relaxed)
    }

    /// Completion count for a phase label (`"completed"` / `"failed"`).
    pub fn completions_with_phase(&self, phase: WorkflowPhase) -> u64 {
        let counters = self.workflow_completions.lock().unwrap();
        counters
            .iter()
            .filter(|(key, _)| key.ends_with(phase.as_label()))
            .map(|(_, count)| *count)
            .sum()
    }

    /// Execution count for a `task_type/status/workflow` label set.
    pub fn task_executions_with(&self, task_type: &str, status: &str, workflow: &str) -> u64 {
        let key = format!("{task_type}/{status}/{workflow}");
        *self.task_executions.lock().unwrap().get(&key).unwrap_or(&0)
    }

    pub fn errors_with(&self, error_type: &str, workflow: &str) -> u64 {
        let key = format!("{error_type}/{workflow}");
        *self.errors.lock().unwrap().get(&key).unwrap_or(&0)
    }

    pub fn retries_with(&self, task_type: &str, workflow: &str, task: &str) -> u64 {
        let key = format!("{task_type}/{workflow}/{task}");
        *self.retries.lock().unwrap().get(&key).unwrap_or(&0)
    }

    fn saturating_decrement(gauge: &AtomicU64) {
        // The closure always returns Some, so fetch_update cannot fail.
        let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
            Some(current.saturating_sub(1))
        });
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_workflow_start(&self, _workflow: &str) {
        self.workflow_starts.fetch_add(1, Ordering::Relaxed);
        self.active_workflows.fetch_add(1, Ordering::Relaxed);
    }

    fn record_workflow_completion(&self, workflow: &str, phase: WorkflowPhase, duration: Duration) {
        let key = format!("{workflow}/{}", phase.as_label());
        *self
            .workflow_completions
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(0) += 1;
        *self
            .workflow_durations
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(Duration::ZERO) += duration;
        Self::saturating_decrement(&self.active_workflows);
    }

    fn record_workflow_deletion(&self, _workflow: &str) {
        self.workflow_deletions.fetch_add(1, Ordering::Relaxed);
        Self::saturating_decrement(&self.active_workflows);
    }

    fn record_task_execution(
        &self,
        task_type: &str,
        status: &str,
        duration: Duration,
        workflow: &str,
        task: &str,
    ) {
        let key = format!("{task_type}/{status}/{workflow}");
        *self
            .task_executions
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(0) += 1;

        let duration_key = format!("{task_type}/{workflow}/{task}");
        *self
            .task_durations
            .lock()
            .unwrap()
            .entry(duration_key)
            .or_insert(Duration::ZERO) += duration;
    }

    fn record_error(&self, error_type: &str, workflow: &str) {
        let key = format!("{error_type}/{workflow}");
        *self.errors.lock().unwrap().entry(key).or_insert(0) += 1;
    }

    fn record_retry(&self, task_type: &str, workflow: &str, task: &str) {
        let key = format!("{task_type}/{workflow}/{task}");
        *self.retries.lock().unwrap().entry(key).or_insert(0) += 1;
    }
}
