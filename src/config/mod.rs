// src/config/mod.rs

//! Workflow definition loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workflow file from disk (`loader.rs`).
//! - Validate definition invariants: task kinds, payload shape, dependency
//!   references, acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{TaskSection, WorkflowDefinition, WorkflowFile, WorkflowSection};
pub use validate::validate_workflow;
