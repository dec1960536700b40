// tests/failure_policy.rs

//! Optional vs required task failure, abort, and cancellation.

use std::error::Error;
use std::sync::Arc;

use flowdag::engine::Scheduler;
use flowdag::errors::FlowdagError;
use flowdag::metrics::InMemoryMetrics;
use flowdag::status::{TaskStatus, WorkflowPhase, WorkflowRun};
use flowdag_test_utils::builders::{TaskSpecBuilder, WorkflowBuilder};
use flowdag_test_utils::fake_executor::FakeExecutor;
use flowdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn run_collecting(
    scheduler: &Scheduler,
    workflow: &str,
    specs: &[flowdag::dag::TaskSpec],
) -> (Result<WorkflowPhase, FlowdagError>, WorkflowRun) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let scheduler_with_tx = Scheduler::new(
        Arc::clone(scheduler.executor()),
        Arc::clone(scheduler.metrics()),
    )
    .with_patch_channel(tx);

    let result = with_timeout(scheduler_with_tx.run(workflow, specs)).await;
    drop(scheduler_with_tx);

    let mut run = WorkflowRun::default();
    while let Some(patch) = rx.recv().await {
        run.apply(&patch);
    }
    (result, run)
}

/// Required failure aborts the run: never-dispatched tasks end Cancelled,
/// the phase is Failed, and the error names the failed task.
#[tokio::test]
async fn required_failure_aborts_and_cancels() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .with_task(TaskSpecBuilder::job("b").depends_on("a"))
        .with_task(TaskSpecBuilder::job("c").depends_on("b"))
        .build();

    let executor = Arc::new(FakeExecutor::new().failing("b"));
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let (result, run) = run_collecting(&scheduler, "abort", &specs).await;

    match result {
        Err(FlowdagError::TaskExecution { task, .. }) => assert_eq!(task, "b"),
        other => panic!("expected TaskExecution error, got {other:?}"),
    }

    assert_eq!(run.phase, WorkflowPhase::Failed);
    assert_eq!(run.task_status("a"), Some(TaskStatus::Completed));
    assert_eq!(run.task_status("b"), Some(TaskStatus::Failed));
    assert_eq!(run.task_status("c"), Some(TaskStatus::Cancelled));
    assert!(run.tasks["b"].error.is_some());

    // c was never handed to the executor.
    assert_eq!(executor.executed(), vec!["a", "b"]);
    Ok(())
}

/// Optional failure is recorded but the workflow completes.
#[tokio::test]
async fn optional_failure_does_not_abort() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .with_task(TaskSpecBuilder::job("b").optional())
        .build();

    let executor = Arc::new(FakeExecutor::new().failing("b"));
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let (result, run) = run_collecting(&scheduler, "optional", &specs).await;

    assert_eq!(result?, WorkflowPhase::Completed);
    assert_eq!(run.phase, WorkflowPhase::Completed);
    assert_eq!(run.task_status("a"), Some(TaskStatus::Completed));
    assert_eq!(run.task_status("b"), Some(TaskStatus::Failed));

    assert_eq!(metrics.retries_with("job", "optional", "b"), 1);
    assert_eq!(metrics.errors_with("optional_task_failed", "optional"), 1);
    Ok(())
}

/// A dependent of a failed optional task still runs: any terminal status of
/// the dependency satisfies it.
#[tokio::test]
async fn dependent_of_failed_optional_still_runs() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("warmup").optional())
        .with_task(TaskSpecBuilder::job("main").depends_on("warmup"))
        .build();

    let executor = Arc::new(FakeExecutor::new().failing("warmup"));
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let (result, run) = run_collecting(&scheduler, "optional-dep", &specs).await;

    assert_eq!(result?, WorkflowPhase::Completed);
    assert_eq!(run.task_status("warmup"), Some(TaskStatus::Failed));
    assert_eq!(run.task_status("main"), Some(TaskStatus::Completed));
    assert_eq!(executor.executed(), vec!["warmup", "main"]);
    Ok(())
}

/// Required and optional failures in the same run: the required one decides
/// the verdict; the optional one is recorded alongside.
#[tokio::test]
async fn required_failure_wins_over_optional() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("required"))
        .with_task(TaskSpecBuilder::job("best-effort").optional())
        .build();

    let executor = Arc::new(
        FakeExecutor::new()
            .failing("required")
            .failing("best-effort"),
    );
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let (result, run) = run_collecting(&scheduler, "mixed-failures", &specs).await;

    match result {
        Err(FlowdagError::TaskExecution { task, .. }) => assert_eq!(task, "required"),
        other => panic!("expected TaskExecution error, got {other:?}"),
    }
    assert_eq!(run.phase, WorkflowPhase::Failed);
    assert_eq!(run.task_status("required"), Some(TaskStatus::Failed));
    // The optional sibling's own outcome is still recorded.
    assert_eq!(run.task_status("best-effort"), Some(TaskStatus::Failed));
    Ok(())
}

/// In-flight siblings of a failed required task finish naturally and their
/// outcomes are recorded; only future waves are suppressed.
#[tokio::test]
async fn same_wave_siblings_finish_naturally() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("fails"))
        .with_task(TaskSpecBuilder::job("sibling"))
        .with_task(TaskSpecBuilder::job("downstream").depends_on("sibling"))
        .build();

    let executor = Arc::new(FakeExecutor::new().failing("fails"));
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let (result, run) = run_collecting(&scheduler, "siblings", &specs).await;

    assert!(result.is_err());
    // The sibling in the same wave ran to completion.
    assert_eq!(run.task_status("sibling"), Some(TaskStatus::Completed));
    // The next wave never dispatched.
    assert_eq!(run.task_status("downstream"), Some(TaskStatus::Cancelled));
    assert!(!executor.executed().contains(&"downstream".to_string()));
    Ok(())
}

/// Workflow completion metrics reflect the terminal phase.
#[tokio::test]
async fn completion_metrics_record_phase() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("only"))
        .build();

    let executor = Arc::new(FakeExecutor::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor, metrics.clone());

    with_timeout(scheduler.run("metrics", &specs)).await?;
    assert_eq!(metrics.completions_with_phase(WorkflowPhase::Completed), 1);
    assert_eq!(metrics.completions_with_phase(WorkflowPhase::Failed), 0);

    let failing = Arc::new(FakeExecutor::new().failing("only"));
    let scheduler = Scheduler::new(failing, metrics.clone());
    let result = with_timeout(scheduler.run("metrics", &specs)).await;
    assert!(result.is_err());
    assert_eq!(metrics.completions_with_phase(WorkflowPhase::Failed), 1);
    Ok(())
}
