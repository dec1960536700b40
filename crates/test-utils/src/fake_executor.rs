//! A scripted in-memory executor for scheduler tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flowdag::dag::TaskSpec;
use flowdag::errors::TaskExecutionError;
use flowdag::exec::TaskExecutor;

/// A fake executor that:
/// - records which tasks were executed (in dispatch-completion order)
/// - fails the tasks it was told to fail
/// - tracks the maximum number of concurrently in-flight tasks, so tests can
///   assert that a wave really fanned out.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    executed: Mutex<Vec<String>>,
    cleaned: Mutex<Vec<String>>,
    failures: HashSet<String>,
    cleanup_failures: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `execute` fail for this task.
    pub fn failing(mut self, task: &str) -> Self {
        self.failures.insert(task.to_string());
        self
    }

    /// Make `cleanup` fail for this task.
    pub fn failing_cleanup(mut self, task: &str) -> Self {
        self.cleanup_failures.insert(task.to_string());
        self
    }

    /// Hold each task in flight for `delay`, so same-wave tasks overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Tasks executed so far, in the order their executions finished.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.cleaned.lock().unwrap().clone()
    }

    /// Highest number of tasks that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn execute(&self, spec: &TaskSpec, _workflow: &str) -> Result<(), TaskExecutionError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(spec.name.clone());

        if self.failures.contains(&spec.name) {
            Err(TaskExecutionError::new(format!(
                "injected failure for '{}'",
                spec.name
            )))
        } else {
            Ok(())
        }
    }

    async fn cleanup(&self, task: &str, _workflow: &str) -> Result<(), TaskExecutionError> {
        self.cleaned.lock().unwrap().push(task.to_string());
        if self.cleanup_failures.contains(task) {
            Err(TaskExecutionError::new(format!(
                "injected cleanup failure for '{task}'"
            )))
        } else {
            Ok(())
        }
    }
}
