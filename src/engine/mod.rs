// src/engine/mod.rs

//! Workflow orchestration engine.
//!
//! - [`scheduler`] drives graph-directed wave execution: validate, fan out
//!   each ready wave to the executor, join, apply status transitions, decide
//!   termination.
//! - [`handlers`] exposes the pure `on_create` / `on_delete` / `on_resume`
//!   entry points an event adapter calls with plain data.

pub mod handlers;
pub mod scheduler;

pub use handlers::{on_create, on_delete, on_resume};
pub use scheduler::{RunReport, Scheduler};
