// tests/handlers.rs

//! The on_create / on_delete / on_resume entry points.

use std::error::Error;
use std::sync::Arc;

use flowdag::engine::{on_create, on_delete, on_resume, Scheduler};
use flowdag::errors::FlowdagError;
use flowdag::exec::TaskExecutor;
use flowdag::metrics::{InMemoryMetrics, MetricsSink};
use flowdag::status::WorkflowPhase;
use flowdag_test_utils::builders::{TaskSpecBuilder, WorkflowBuilder};
use flowdag_test_utils::fake_executor::FakeExecutor;
use flowdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn on_create_records_start_and_runs() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .with_task(TaskSpecBuilder::job("b").depends_on("a"))
        .build();

    let executor = Arc::new(FakeExecutor::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let phase = with_timeout(on_create(&scheduler, "created", &specs)).await?;
    assert_eq!(phase, WorkflowPhase::Completed);
    assert_eq!(metrics.workflow_starts(), 1);
    assert_eq!(executor.executed(), vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn on_delete_cleans_every_task() -> TestResult {
    init_tracing();

    let fake = Arc::new(FakeExecutor::new());
    let executor: Arc<dyn TaskExecutor> = fake.clone();
    let metrics_impl = Arc::new(InMemoryMetrics::new());
    let metrics: Arc<dyn MetricsSink> = metrics_impl.clone();

    let tasks = vec!["a".to_string(), "b".to_string()];
    with_timeout(on_delete(&executor, &metrics, "gone", &tasks)).await?;

    // Nothing had resources, yet cleanup succeeds: idempotent by contract.
    assert_eq!(fake.cleaned(), vec!["a", "b"]);
    assert_eq!(metrics_impl.workflow_deletions(), 1);
    Ok(())
}

#[tokio::test]
async fn on_delete_sweeps_past_failures() -> TestResult {
    init_tracing();

    let fake = Arc::new(FakeExecutor::new().failing_cleanup("a"));
    let executor: Arc<dyn TaskExecutor> = fake.clone();
    let metrics_impl = Arc::new(InMemoryMetrics::new());
    let metrics: Arc<dyn MetricsSink> = metrics_impl.clone();

    let tasks = vec!["a".to_string(), "b".to_string()];
    let result = with_timeout(on_delete(&executor, &metrics, "gone", &tasks)).await;

    // The failure is reported, but b was still cleaned.
    match result {
        Err(FlowdagError::TaskExecution { task, .. }) => assert_eq!(task, "a"),
        other => panic!("expected TaskExecution error, got {other:?}"),
    }
    assert_eq!(fake.cleaned(), vec!["a", "b"]);
    assert_eq!(metrics_impl.workflow_deletions(), 1);
    assert_eq!(metrics_impl.errors_with("cleanup_failed", "gone"), 1);
    Ok(())
}

#[tokio::test]
async fn on_resume_reruns_non_terminal() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .build();

    let executor = Arc::new(FakeExecutor::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let phase = with_timeout(on_resume(
        &scheduler,
        "resumed",
        &specs,
        Some(WorkflowPhase::Running),
    ))
    .await?;

    assert_eq!(phase, WorkflowPhase::Completed);
    assert_eq!(executor.executed(), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn on_resume_skips_terminal_workflows() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .build();

    let executor = Arc::new(FakeExecutor::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    for phase in [WorkflowPhase::Completed, WorkflowPhase::Failed] {
        let result =
            with_timeout(on_resume(&scheduler, "done", &specs, Some(phase))).await?;
        assert_eq!(result, phase);
    }

    // Nothing was re-executed.
    assert!(executor.executed().is_empty());
    assert_eq!(metrics.workflow_starts(), 0);
    Ok(())
}

#[tokio::test]
async fn on_resume_with_unknown_phase_runs() -> TestResult {
    init_tracing();

    let specs = WorkflowBuilder::new()
        .with_task(TaskSpecBuilder::job("a"))
        .build();

    let executor = Arc::new(FakeExecutor::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let scheduler = Scheduler::new(executor.clone(), metrics.clone());

    let phase = with_timeout(on_resume(&scheduler, "fresh", &specs, None)).await?;
    assert_eq!(phase, WorkflowPhase::Completed);
    assert_eq!(metrics.workflow_starts(), 1);
    Ok(())
}
