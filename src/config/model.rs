// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::{ServicePort, TaskPayload, TaskSpec};
use crate::errors::{FlowdagError, Result};

/// Top-level workflow definition as read from a TOML file.
///
/// ```toml
/// [workflow]
/// name = "data-pipeline"
///
/// [task.extract]
/// kind = "job"
/// image = "ghcr.io/acme/extract:1.2"
/// command = ["python", "extract.py"]
///
/// [task.load]
/// kind = "job"
/// image = "ghcr.io/acme/load:1.2"
/// depends_on = ["extract"]
/// optional = true
///
/// [task.frontend]
/// kind = "service"
/// selector = { app = "frontend" }
/// ports = [{ port = 80, target_port = 8080 }]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowFile {
    /// `[workflow]` section.
    pub workflow: WorkflowSection,

    /// All tasks from `[task.<name>]`. Keys are the task names.
    #[serde(default)]
    pub task: BTreeMap<String, TaskSection>,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    pub name: String,
}

/// `[task.<name>]` section.
///
/// `kind` stays a plain string here so that an unknown kind surfaces as a
/// structured `UnsupportedTaskType` during validation instead of a serde
/// parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSection {
    pub kind: String,

    /// Job fields.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,

    /// Service fields.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,

    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}

/// A validated workflow ready to hand to the scheduler.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub specs: Vec<TaskSpec>,
}

impl WorkflowFile {
    /// Convert into the flat task list the scheduler consumes.
    ///
    /// Kinds are routed here; anything other than `"job"` / `"service"` is a
    /// hard `UnsupportedTaskType` failure, never silently ignored.
    pub fn into_specs(self) -> Result<Vec<TaskSpec>> {
        let mut specs = Vec::with_capacity(self.task.len());

        for (name, section) in self.task {
            let payload = match section.kind.as_str() {
                "job" => TaskPayload::Job {
                    image: section.image.unwrap_or_default(),
                    command: section.command,
                    args: section.args,
                },
                "service" => TaskPayload::Service {
                    selector: section.selector,
                    ports: section.ports,
                },
                other => {
                    return Err(FlowdagError::UnsupportedTaskType {
                        task: name,
                        kind: other.to_string(),
                    });
                }
            };

            specs.push(TaskSpec {
                name,
                payload,
                depends_on: section.depends_on,
                optional: section.optional,
            });
        }

        Ok(specs)
    }
}
