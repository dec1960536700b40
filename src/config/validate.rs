// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::WorkflowFile;
use crate::errors::{FlowdagError, Result};

const SUPPORTED_KINDS: &[&str] = &["job", "service"];

/// Run semantic validation against a loaded workflow file.
///
/// This checks:
/// - the workflow has a non-empty name and at least one task
/// - every task kind is supported
/// - job tasks name an image; service tasks expose at least one port
/// - all `depends_on` references refer to existing tasks (no self-deps)
/// - the dependency graph has no cycles
///
/// The scheduler re-validates references and cycles when it builds its own
/// graph (it also accepts specs that never went through a file), but a file
/// rejected here never reaches it.
pub fn validate_workflow(file: &WorkflowFile) -> Result<()> {
    if file.workflow.name.trim().is_empty() {
        return Err(FlowdagError::Definition(
            "[workflow].name must not be empty".to_string(),
        ));
    }
    if file.task.is_empty() {
        return Err(FlowdagError::Definition(
            "workflow must contain at least one [task.<name>] section".to_string(),
        ));
    }

    validate_task_payloads(file)?;
    validate_task_dependencies(file)?;
    validate_acyclic(file)?;
    Ok(())
}

fn validate_task_payloads(file: &WorkflowFile) -> Result<()> {
    for (name, task) in file.task.iter() {
        if !SUPPORTED_KINDS.contains(&task.kind.as_str()) {
            return Err(FlowdagError::UnsupportedTaskType {
                task: name.clone(),
                kind: task.kind.clone(),
            });
        }

        match task.kind.as_str() {
            "job" => {
                if task.image.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(FlowdagError::Definition(format!(
                        "job task '{name}' must set `image`"
                    )));
                }
            }
            "service" => {
                if task.ports.is_empty() {
                    return Err(FlowdagError::Definition(format!(
                        "service task '{name}' must expose at least one port"
                    )));
                }
            }
            _ => unreachable!("kind checked against SUPPORTED_KINDS above"),
        }
    }
    Ok(())
}

fn validate_task_dependencies(file: &WorkflowFile) -> Result<()> {
    for (name, task) in file.task.iter() {
        for dep in task.depends_on.iter() {
            if dep == name {
                return Err(FlowdagError::CyclicDependency { task: name.clone() });
            }
            if !file.task.contains_key(dep) {
                return Err(FlowdagError::UnknownDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_acyclic(file: &WorkflowFile) -> Result<()> {
    // Edge direction: dep -> task. For
    //   [task.b]
    //   depends_on = ["a"]
    // we add edge a -> b.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in file.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in file.task.iter() {
        for dep in task.depends_on.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(FlowdagError::CyclicDependency {
            task: cycle.node_id().to_string(),
        }),
    }
}
