// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{WorkflowDefinition, WorkflowFile};
use crate::config::validate::validate_workflow;
use crate::errors::Result;

/// Load a workflow file from a given path and return the raw [`WorkflowFile`].
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (dependency correctness, task kinds, etc.). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let file: WorkflowFile = toml::from_str(&contents)?;
    Ok(file)
}

/// Load a workflow file and run full validation.
///
/// This is the entry point the CLI uses:
/// - reads TOML, applying serde defaults;
/// - checks task kinds, payload shape, dependency references, and acyclicity;
/// - converts to the flat [`crate::dag::TaskSpec`] list the scheduler takes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowDefinition> {
    let file = load_from_path(path)?;
    validate_workflow(&file)?;

    let name = file.workflow.name.clone();
    let specs = file.into_specs()?;
    Ok(WorkflowDefinition { name, specs })
}
