// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::dag::task_spec::{TaskName, TaskSpec};
use crate::errors::{FlowdagError, Result};

/// Internal node structure: stores a spec plus its direct dependents.
#[derive(Debug, Clone)]
struct GraphNode {
    spec: TaskSpec,
    /// Tasks that list this one in their `depends_on`.
    dependents: Vec<TaskName>,
}

/// Validated dependency graph for one workflow, keyed by task name.
///
/// Construction performs the full definition-level validation: duplicate
/// names, dangling `depends_on` references, and cycles. Layering uses Kahn's
/// algorithm, which doubles as the cycle check: any residual set whose
/// in-degree never reaches zero is cyclic.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: BTreeMap<TaskName, GraphNode>,
    /// Topological layers: layer 0 holds tasks with no dependencies; each
    /// subsequent layer depends only on earlier layers.
    layers: Vec<Vec<TaskName>>,
}

impl WorkflowGraph {
    /// Build and validate a graph from a flat task list.
    ///
    /// Fails with `DuplicateTask`, `UnknownDependency`, or `CyclicDependency`
    /// before any task could run. The named cycle member is deterministic
    /// (lexicographically smallest task in the residual set).
    pub fn build(specs: &[TaskSpec]) -> Result<Self> {
        let mut nodes: BTreeMap<TaskName, GraphNode> = BTreeMap::new();

        for spec in specs {
            let previous = nodes.insert(
                spec.name.clone(),
                GraphNode {
                    spec: spec.clone(),
                    dependents: Vec::new(),
                },
            );
            if previous.is_some() {
                return Err(FlowdagError::DuplicateTask(spec.name.clone()));
            }
        }

        // Every dependency must resolve to a task in the same workflow.
        for spec in specs {
            for dep in &spec.depends_on {
                if !nodes.contains_key(dep) {
                    return Err(FlowdagError::UnknownDependency {
                        task: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Second pass: populate dependents based on deps.
        for spec in specs {
            for dep in &spec.depends_on {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(spec.name.clone());
                }
            }
        }

        let layers = compute_layers(&nodes)?;
        debug!(tasks = nodes.len(), layers = layers.len(), "workflow graph built");

        Ok(Self { nodes, layers })
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All task specs, in name order.
    pub fn specs(&self) -> impl Iterator<Item = &TaskSpec> {
        self.nodes.values().map(|n| &n.spec)
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.nodes.get(name).map(|n| &n.spec)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.spec.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Topological layers computed at build time.
    ///
    /// These are the waves a failure-free run would execute; the scheduler
    /// recomputes readiness incrementally instead of walking this directly,
    /// because terminal-but-failed optional dependencies shift wave contents.
    pub fn layers(&self) -> &[Vec<TaskName>] {
        &self.layers
    }

    /// Tasks whose full dependency set is contained in `terminal` and that
    /// are not themselves in `terminal`.
    ///
    /// `terminal` holds names of tasks that reached *any* terminal status;
    /// a Failed-but-optional dependency satisfies its dependents. Required
    /// failures never reach this point: the scheduler aborts the run first.
    pub fn ready_tasks(&self, terminal: &HashSet<TaskName>) -> Vec<&TaskSpec> {
        self.nodes
            .values()
            .filter(|node| {
                !terminal.contains(&node.spec.name)
                    && node.spec.depends_on.iter().all(|d| terminal.contains(d))
            })
            .map(|node| &node.spec)
            .collect()
    }
}

/// Kahn's algorithm: peel zero-in-degree layers until either all tasks are
/// placed or a cyclic residual remains.
fn compute_layers(nodes: &BTreeMap<TaskName, GraphNode>) -> Result<Vec<Vec<TaskName>>> {
    let mut in_degree: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|(name, node)| (name.as_str(), node.spec.depends_on.len()))
        .collect();

    let mut layers: Vec<Vec<TaskName>> = Vec::new();
    let mut placed = 0usize;

    loop {
        // BTreeMap iteration keeps each layer in name order, so layer
        // contents are deterministic for a given task set.
        let layer: Vec<TaskName> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| name.to_string())
            .collect();

        if layer.is_empty() {
            break;
        }

        for name in &layer {
            in_degree.remove(name.as_str());
            for dependent in nodes[name].dependents.iter() {
                if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                    *deg -= 1;
                }
            }
        }

        placed += layer.len();
        layers.push(layer);
    }

    if placed < nodes.len() {
        // The residual set is cyclic; report its smallest member.
        let task = in_degree
            .keys()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_default();
        return Err(FlowdagError::CyclicDependency { task });
    }

    Ok(layers)
}
