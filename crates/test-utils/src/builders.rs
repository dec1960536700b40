//! Builders for task specs and workflows to simplify test setup.

use std::collections::BTreeMap;

use flowdag::dag::{ServicePort, TaskPayload, TaskSpec};

/// Builder for a single [`TaskSpec`].
///
/// Defaults to a required job task with a placeholder image and no
/// dependencies; tests override only what they care about.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn job(name: &str) -> Self {
        Self {
            spec: TaskSpec {
                name: name.to_string(),
                payload: TaskPayload::Job {
                    image: format!("test/{name}:latest"),
                    command: vec!["true".to_string()],
                    args: Vec::new(),
                },
                depends_on: Vec::new(),
                optional: false,
            },
        }
    }

    pub fn service(name: &str) -> Self {
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), name.to_string());
        Self {
            spec: TaskSpec {
                name: name.to_string(),
                payload: TaskPayload::Service {
                    selector,
                    ports: vec![ServicePort {
                        port: 80,
                        target_port: Some(8080),
                        protocol: "TCP".to_string(),
                    }],
                },
                depends_on: Vec::new(),
                optional: false,
            },
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.spec.depends_on.push(dep.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.spec.optional = true;
        self
    }

    pub fn command(mut self, command: &[&str]) -> Self {
        if let TaskPayload::Job { command: cmd, .. } = &mut self.spec.payload {
            *cmd = command.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// Builder for a whole workflow's task list.
pub struct WorkflowBuilder {
    specs: Vec<TaskSpec>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    pub fn with_task(mut self, builder: TaskSpecBuilder) -> Self {
        self.specs.push(builder.build());
        self
    }

    pub fn with_spec(mut self, spec: TaskSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> Vec<TaskSpec> {
        self.specs
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}
