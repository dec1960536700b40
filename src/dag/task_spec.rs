// src/dag/task_spec.rs

//! Static task definitions as consumed by the graph and scheduler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

fn default_protocol() -> String {
    "TCP".to_string()
}

/// A single port exposed by a service-style task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u16,
    /// Port on the backing workload; defaults to `port` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl ServicePort {
    pub fn effective_target_port(&self) -> u16 {
        self.target_port.unwrap_or(self.port)
    }
}

/// Executor payload of a task, keyed by task kind.
///
/// The scheduler never looks inside the payload; it only routes by kind. A
/// kind string that does not map onto one of these variants is rejected as
/// `UnsupportedTaskType` during workflow validation, before anything runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskPayload {
    /// A run-to-completion workload.
    Job {
        image: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        command: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    /// A long-lived endpoint fronting other workloads.
    Service {
        selector: BTreeMap<String, String>,
        ports: Vec<ServicePort>,
    },
}

impl TaskPayload {
    /// Stable kind tag used for metrics labels and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskPayload::Job { .. } => "job",
            TaskPayload::Service { .. } => "service",
        }
    }
}

/// A fully-resolved task definition within a workflow.
///
/// Immutable once a run starts; the per-run state lives in
/// [`crate::status::StatusTracker`], never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique within the workflow.
    pub name: TaskName,
    #[serde(flatten)]
    pub payload: TaskPayload,
    /// Names of tasks that must reach a terminal status before this one runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskName>,
    /// Failure of an optional task does not abort the workflow.
    #[serde(default)]
    pub optional: bool,
}

impl TaskSpec {
    /// Stable type tag of the payload (`"job"` / `"service"`).
    pub fn task_type(&self) -> &'static str {
        self.payload.kind()
    }
}
