// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod metrics;
pub mod status;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::WorkflowDefinition;
use crate::dag::WorkflowGraph;
use crate::engine::{on_create, Scheduler};
use crate::errors::Result;
use crate::exec::{LocalProcessExecutor, TaskExecutor};
use crate::metrics::{LogMetrics, MetricsSink};
use crate::status::StatusPatch;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workflow definition loading + validation
/// - the local process executor and log-based metrics sink
/// - the scheduler, run once via the `on_create` entry point
pub async fn run(args: CliArgs) -> Result<()> {
    let definition = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&definition)?;
        return Ok(());
    }

    let executor: Arc<dyn TaskExecutor> = Arc::new(LocalProcessExecutor::new());
    let metrics: Arc<dyn MetricsSink> = Arc::new(LogMetrics);

    let mut scheduler = Scheduler::new(executor, metrics);

    // Optionally stream every status patch to stdout as JSON, the same shape
    // a status store would persist.
    let printer = if args.emit_patches {
        let (tx, mut rx) = mpsc::unbounded_channel::<StatusPatch>();
        scheduler = scheduler.with_patch_channel(tx);
        Some(tokio::spawn(async move {
            while let Some(patch) = rx.recv().await {
                match serde_json::to_string(&patch) {
                    Ok(json) => println!("{json}"),
                    Err(err) => eprintln!("failed to serialize patch: {err}"),
                }
            }
        }))
    } else {
        None
    };

    let result = on_create(&scheduler, &definition.name, &definition.specs).await;

    // Drop the scheduler's sender so the printer drains and stops.
    drop(scheduler);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    let phase = result?;
    info!(workflow = %definition.name, phase = phase.as_label(), "workflow finished");
    println!("workflow '{}' finished: {}", definition.name, phase.as_label());
    Ok(())
}

/// Dry-run output: print tasks and the wave plan without executing anything.
fn print_dry_run(definition: &WorkflowDefinition) -> Result<()> {
    let graph = WorkflowGraph::build(&definition.specs)?;

    println!("flowdag dry-run: workflow '{}'", definition.name);
    println!();

    println!("tasks ({}):", definition.specs.len());
    for spec in graph.specs() {
        println!("  - {} ({})", spec.name, spec.task_type());
        if !spec.depends_on.is_empty() {
            println!("      depends_on: {:?}", spec.depends_on);
        }
        if spec.optional {
            println!("      optional: true");
        }
    }

    println!();
    println!("execution plan ({} waves):", graph.layers().len());
    for (i, layer) in graph.layers().iter().enumerate() {
        println!("  wave {}: {:?}", i + 1, layer);
    }

    Ok(())
}
