// src/exec/process.rs

//! Local process-based task executor.
//!
//! Runs job-style tasks as local child processes via `tokio::process` and
//! keeps an in-memory registry of service-style tasks so `cleanup` has a
//! resource to remove idempotently. This is the executor the CLI wires in;
//! hosts embedding the library provide their own [`TaskExecutor`] that talks
//! to whatever backend actually owns the workloads.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::dag::{TaskPayload, TaskSpec};
use crate::errors::TaskExecutionError;
use crate::exec::TaskExecutor;

/// Executes jobs as local shell processes and services as registry entries.
#[derive(Debug, Default)]
pub struct LocalProcessExecutor {
    /// `workflow/task` pairs with a live "resource" (a registered service or
    /// a job that ran). Cleanup removes entries; a missing entry is success.
    resources: Mutex<HashSet<(String, String)>>,
}

impl LocalProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a resource for this task is currently registered.
    pub fn has_resource(&self, task: &str, workflow: &str) -> bool {
        self.resources
            .lock()
            .unwrap()
            .contains(&(workflow.to_string(), task.to_string()))
    }

    fn register(&self, task: &str, workflow: &str) {
        self.resources
            .lock()
            .unwrap()
            .insert((workflow.to_string(), task.to_string()));
    }

    async fn run_job(
        &self,
        spec: &TaskSpec,
        workflow: &str,
        command: &[String],
        args: &[String],
    ) -> Result<(), TaskExecutionError> {
        if command.is_empty() {
            return Err(TaskExecutionError::new(format!(
                "job task '{}' has no command to run locally",
                spec.name
            )));
        }

        info!(
            workflow,
            task = %spec.name,
            command = %command.join(" "),
            "starting job process"
        );

        let mut cmd = Command::new(&command[0]);
        cmd.args(&command[1..])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            TaskExecutionError::new(format!(
                "spawning process for task '{}': {err}",
                spec.name
            ))
        })?;

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let task_name = spec.name.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_name, "stderr: {}", line);
                }
            });
        }
        if let Some(stdout) = child.stdout.take() {
            let task_name = spec.name.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stdout);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_name, "stdout: {}", line);
                }
            });
        }

        let status = child.wait().await.map_err(|err| {
            TaskExecutionError::new(format!(
                "waiting for process of task '{}': {err}",
                spec.name
            ))
        })?;

        if !status.success() {
            return Err(TaskExecutionError::new(format!(
                "task '{}' exited with {status}",
                spec.name
            )));
        }

        self.register(&spec.name, workflow);
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for LocalProcessExecutor {
    async fn execute(&self, spec: &TaskSpec, workflow: &str) -> Result<(), TaskExecutionError> {
        match &spec.payload {
            TaskPayload::Job { command, args, .. } => {
                self.run_job(spec, workflow, command, args).await
            }
            TaskPayload::Service { selector, ports } => {
                info!(
                    workflow,
                    task = %spec.name,
                    ?selector,
                    ports = ports.len(),
                    "registering service"
                );
                self.register(&spec.name, workflow);
                Ok(())
            }
        }
    }

    async fn cleanup(&self, task: &str, workflow: &str) -> Result<(), TaskExecutionError> {
        let removed = self
            .resources
            .lock()
            .unwrap()
            .remove(&(workflow.to_string(), task.to_string()));

        if removed {
            info!(workflow, task, "cleaned up task resource");
        } else {
            // Nothing to remove; cleanup is idempotent.
            warn!(workflow, task, "cleanup found no resource; treating as done");
        }
        Ok(())
    }
}
