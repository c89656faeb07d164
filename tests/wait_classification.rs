// tests/wait_classification.rs

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use procwarden::errors::ProcwardenError;
use procwarden::exec::{WaitOutcome, classify_wait};
use procwarden::types::{RunStatus, SENTINEL_EXIT_CODE};

fn exited_with(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

fn killed_by(signal: i32) -> ExitStatus {
    ExitStatus::from_raw(signal)
}

#[test]
fn exit_code_is_passed_through() {
    let result = classify_wait(WaitOutcome {
        status: Some(exited_with(42)),
        error: None,
        cancelled: false,
    });

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.exit_code, 42);
    assert!(result.error.is_none());
}

#[test]
fn wait_error_does_not_override_a_valid_state() {
    let result = classify_wait(WaitOutcome {
        status: Some(exited_with(0)),
        error: Some(io::Error::other("spurious wait error")),
        cancelled: false,
    });

    assert!(result.is_success());
    assert!(result.error.is_none());
}

#[test]
fn missing_state_is_a_hard_failure_with_the_wait_error() {
    let result = classify_wait(WaitOutcome {
        status: None,
        error: Some(io::Error::other("ECHILD")),
        cancelled: false,
    });

    assert_eq!(result.status, RunStatus::Fail);
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
    match result.error {
        Some(ProcwardenError::Wait(e)) => assert_eq!(e.to_string(), "ECHILD"),
        other => panic!("expected Wait error, got {other:?}"),
    }
}

#[test]
fn signal_death_is_a_failure() {
    let result = classify_wait(WaitOutcome {
        status: Some(killed_by(15)),
        error: None,
        cancelled: false,
    });

    assert_eq!(result.status, RunStatus::Fail);
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
    assert!(matches!(result.error, Some(ProcwardenError::Signaled(15))));
}

#[test]
fn signal_death_after_cancel_is_reported_as_cancelled() {
    let result = classify_wait(WaitOutcome {
        status: Some(killed_by(9)),
        error: None,
        cancelled: true,
    });

    assert_eq!(result.status, RunStatus::Fail);
    assert!(matches!(result.error, Some(ProcwardenError::Cancelled)));
}

#[test]
fn late_cancel_does_not_hide_a_real_exit_code() {
    let result = classify_wait(WaitOutcome {
        status: Some(exited_with(0)),
        error: None,
        cancelled: true,
    });

    assert!(result.is_success());
}
