// tests/config_loading.rs
mod common;
use crate::common::builders::JobFileBuilder;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use procwarden::config::{JobFile, load_and_validate, load_from_path};
use procwarden::errors::ProcwardenError;
use procwarden::exec::{CaptureSink, OutputSinks, Supervisor};
use procwarden::types::{IdentitySource, RunStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn job_file(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

#[test]
fn full_job_file_maps_onto_a_process_spec() -> TestResult {
    init_tracing();

    let file = job_file(
        r#"
[supervisor]
output_grace_ms = 50
identity_source = "id"

[job]
command = "sh"
args = ["-c", "echo hello"]
working_dir = "/tmp"
user = "nobody"
home_dir = "/tmp"
timeout_secs = 7

[job.env]
FOO = "bar"
"#,
    )?;

    let job = load_and_validate(file.path())?;
    assert_eq!(job.supervisor.output_grace(), Duration::from_millis(50));
    assert_eq!(job.supervisor.identity_source, IdentitySource::Id);

    let spec = job.process_spec();
    assert_eq!(spec.command, PathBuf::from("sh"));
    assert_eq!(spec.args, vec!["-c".to_string(), "echo hello".to_string()]);
    assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp")));
    assert_eq!(spec.user.as_deref(), Some("nobody"));
    assert_eq!(spec.home_dir, Some(PathBuf::from("/tmp")));
    assert_eq!(spec.timeout, Duration::from_secs(7));
    assert_eq!(
        spec.env.as_ref().and_then(|env| env.get("FOO")).map(String::as_str),
        Some("bar")
    );
    Ok(())
}

#[test]
fn minimal_job_file_uses_defaults() -> TestResult {
    init_tracing();

    let file = job_file(
        r#"
[job]
command = "true"
timeout_secs = 1
"#,
    )?;

    let job = load_and_validate(file.path())?;
    assert_eq!(job.supervisor.output_grace_ms, 200);
    assert_eq!(job.supervisor.identity_source, IdentitySource::Nss);

    let spec = job.process_spec();
    assert!(spec.args.is_empty());
    assert!(spec.working_dir.is_none());
    assert!(spec.env.is_none());
    assert!(spec.user.is_none());
    assert!(spec.home_dir.is_none());
    Ok(())
}

#[test]
fn zero_timeout_returns_config_error() -> TestResult {
    let file = job_file(
        r#"
[job]
command = "true"
timeout_secs = 0
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(ProcwardenError::ConfigError(msg)) => assert!(msg.contains("timeout_secs")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
    Ok(())
}

#[test]
fn blank_command_returns_config_error() -> TestResult {
    let file = job_file(
        r#"
[job]
command = "   "
timeout_secs = 3
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(ProcwardenError::ConfigError(msg)) => assert!(msg.contains("command")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
    Ok(())
}

#[test]
fn bad_env_name_and_blank_user_are_rejected() {
    let raw = JobFileBuilder::new("true", 1).env("NOT=VALID", "x").build_raw();
    assert!(matches!(JobFile::try_from(raw), Err(ProcwardenError::ConfigError(_))));

    let raw = JobFileBuilder::new("true", 1).user(" ").build_raw();
    assert!(matches!(JobFile::try_from(raw), Err(ProcwardenError::ConfigError(_))));
}

#[test]
fn unknown_identity_source_is_a_toml_error() -> TestResult {
    let file = job_file(
        r#"
[supervisor]
identity_source = "ldap"

[job]
command = "true"
timeout_secs = 1
"#,
    )?;

    assert!(matches!(
        load_from_path(file.path()),
        Err(ProcwardenError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_job_section_is_a_toml_error() -> TestResult {
    let file = job_file("[supervisor]\noutput_grace_ms = 10\n")?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProcwardenError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/nonexistent/procwarden-job.toml"),
        Err(ProcwardenError::IoError(_))
    ));
}

#[tokio::test]
async fn job_from_builder_runs_under_the_supervisor() -> TestResult {
    init_tracing();

    let job = JobFileBuilder::new("/bin/sh", 5)
        .arg("-c")
        .arg(r#"echo "$GREETING from $(pwd)""#)
        .env("GREETING", "hi")
        .env("PATH", "/usr/bin:/bin")
        .working_dir("/")
        .output_grace_ms(50)
        .build();

    let out = CaptureSink::new();
    let supervisor = Supervisor::new().with_output_grace(job.supervisor.output_grace());
    let result = with_timeout(
        supervisor.run(&job.process_spec(), OutputSinks::discard().with_stdout(out.clone())),
    )
    .await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(out.contents_lossy(), "hi from /\n");
    Ok(())
}
