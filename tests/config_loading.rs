// tests/config_loading.rs

//! Workflow definition files: parsing, validation, spec conversion.

use std::error::Error;
use std::io::Write;

use flowdag::config::{load_and_validate, load_from_path, validate_workflow};
use flowdag::dag::TaskPayload;
use flowdag::errors::FlowdagError;
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

fn write_workflow(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn loads_a_full_workflow() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "pipeline"

[task.extract]
kind = "job"
image = "ghcr.io/acme/extract:1.2"
command = ["python", "extract.py"]
args = ["--full"]

[task.load]
kind = "job"
image = "ghcr.io/acme/load:1.2"
depends_on = ["extract"]
optional = true

[task.frontend]
kind = "service"
selector = { app = "frontend" }
ports = [{ port = 80, target_port = 8080 }]
"#,
    )?;

    let definition = load_and_validate(file.path())?;
    assert_eq!(definition.name, "pipeline");
    assert_eq!(definition.specs.len(), 3);

    let extract = definition
        .specs
        .iter()
        .find(|s| s.name == "extract")
        .expect("extract task");
    assert_eq!(extract.task_type(), "job");
    match &extract.payload {
        TaskPayload::Job { image, command, args } => {
            assert_eq!(image, "ghcr.io/acme/extract:1.2");
            assert_eq!(command, &["python", "extract.py"]);
            assert_eq!(args, &["--full"]);
        }
        other => panic!("expected job payload, got {other:?}"),
    }

    let load = definition.specs.iter().find(|s| s.name == "load").expect("load task");
    assert!(load.optional);
    assert_eq!(load.depends_on, vec!["extract"]);

    let frontend = definition
        .specs
        .iter()
        .find(|s| s.name == "frontend")
        .expect("frontend task");
    match &frontend.payload {
        TaskPayload::Service { selector, ports } => {
            assert_eq!(selector.get("app").map(String::as_str), Some("frontend"));
            assert_eq!(ports.len(), 1);
            assert_eq!(ports[0].port, 80);
            assert_eq!(ports[0].effective_target_port(), 8080);
            assert_eq!(ports[0].protocol, "TCP");
        }
        other => panic!("expected service payload, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_kind_is_a_hard_failure() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.mystery]
kind = "cronjob"
image = "x"
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(FlowdagError::UnsupportedTaskType { task, kind }) => {
            assert_eq!(task, "mystery");
            assert_eq!(kind, "cronjob");
        }
        other => panic!("expected UnsupportedTaskType, got {other:?}"),
    }
    Ok(())
}

#[test]
fn job_without_image_is_rejected() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.bare]
kind = "job"
"#,
    )?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(FlowdagError::Definition(_))
    ));
    Ok(())
}

#[test]
fn service_without_ports_is_rejected() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.mute]
kind = "service"
selector = { app = "mute" }
"#,
    )?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(FlowdagError::Definition(_))
    ));
    Ok(())
}

#[test]
fn unknown_dependency_is_rejected_at_load() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.a]
kind = "job"
image = "x"
depends_on = ["nope"]
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(FlowdagError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "a");
            assert_eq!(dependency, "nope");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
    Ok(())
}

#[test]
fn dependency_cycle_is_rejected_at_load() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.a]
kind = "job"
image = "x"
depends_on = ["b"]

[task.b]
kind = "job"
image = "x"
depends_on = ["a"]
"#,
    )?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(FlowdagError::CyclicDependency { .. })
    ));
    Ok(())
}

#[test]
fn empty_workflow_is_rejected() -> TestResult {
    let file = write_workflow(
        r#"
[workflow]
name = "wf"
"#,
    )?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(FlowdagError::Definition(_))
    ));
    Ok(())
}

#[test]
fn raw_load_skips_semantic_validation() -> TestResult {
    // A cycle parses fine; only validation catches it.
    let file = write_workflow(
        r#"
[workflow]
name = "wf"

[task.a]
kind = "job"
image = "x"
depends_on = ["a"]
"#,
    )?;

    let raw = load_from_path(file.path())?;
    assert_eq!(raw.task.len(), 1);
    assert!(validate_workflow(&raw).is_err());
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = write_workflow("not [valid toml")?;

    assert!(matches!(
        load_from_path(file.path()),
        Err(FlowdagError::Toml(_))
    ));
    Ok(())
}
