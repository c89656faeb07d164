// tests/impersonation.rs
//
// Running as another user needs root. Tests that need it return early when
// the host cannot provide it.
mod common;
use crate::common::{FakeIdentityLookup, init_tracing, processes_with_arg, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::unistd::{Gid, Uid, User, getgrouplist, getgroups};

use procwarden::credentials::CredentialResolver;
use procwarden::errors::ProcwardenError;
use procwarden::exec::{CaptureSink, OutputSinks, ProcessSpec, RunPhase, Supervisor};
use procwarden::types::{RunStatus, SENTINEL_EXIT_CODE};

type TestResult = Result<(), Box<dyn Error>>;

fn nobody() -> Option<User> {
    User::from_name("nobody").ok().flatten()
}

#[tokio::test]
async fn runs_as_nobody_with_forced_home() -> TestResult {
    init_tracing();

    if !Uid::effective().is_root() {
        eprintln!("skipping: impersonation requires root");
        return Ok(());
    }
    let Some(nobody) = nobody() else {
        eprintln!("skipping: no `nobody` account on this host");
        return Ok(());
    };
    if nobody.uid.is_root() || nobody.gid.as_raw() == 0 {
        eprintln!("skipping: `nobody` maps to id 0 on this host");
        return Ok(());
    }

    let out = CaptureSink::new();
    let spec = ProcessSpec::new("/bin/sh", Duration::from_secs(5))
        .arg("-c")
        .arg(r#"echo "$HOME"; id -u; id -g; id -G"#)
        .current_dir("/tmp")
        .user("nobody")
        .home_dir("/tmp");

    let result = with_timeout(
        Supervisor::new().run(&spec, OutputSinks::discard().with_stdout(out.clone())),
    )
    .await;

    assert!(result.is_success(), "{result:?}");

    let printed = out.contents_lossy();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 4, "unexpected output {printed:?}");
    assert_eq!(lines[0], "/tmp");
    assert_eq!(lines[1], nobody.uid.to_string());
    assert_eq!(lines[2], nobody.gid.to_string());

    let c_name = std::ffi::CString::new("nobody")?;
    let mut expected: Vec<u32> = getgrouplist(&c_name, nobody.gid)?
        .into_iter()
        .map(|g| g.as_raw())
        .collect();
    let mut actual: Vec<u32> = lines[3]
        .split_whitespace()
        .map(|g| g.parse())
        .collect::<Result<_, _>>()?;
    expected.sort_unstable();
    expected.dedup();
    actual.sort_unstable();
    actual.dedup();
    assert_eq!(actual, expected);
    Ok(())
}

#[tokio::test]
async fn switching_user_without_privileges_fails_to_start() -> TestResult {
    init_tracing();

    if Uid::effective().is_root() {
        eprintln!("skipping: running as root, the switch would succeed");
        return Ok(());
    }

    let lookup = FakeIdentityLookup::new().with_user("someone", 54321, 54321, &[(54321, "someone")]);
    let supervisor = Supervisor::new().with_resolver(CredentialResolver::new(lookup));
    let spec = ProcessSpec::new("true", Duration::from_secs(5)).user("someone");

    let result = with_timeout(supervisor.run(&spec, OutputSinks::discard())).await;

    assert_eq!(result.status, RunStatus::Fail);
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
    assert!(
        matches!(result.error, Some(ProcwardenError::CommandStart { .. })),
        "{result:?}"
    );
    Ok(())
}

#[tokio::test]
async fn identity_errors_abort_before_launch() -> TestResult {
    init_tracing();

    let marker = tempfile::tempdir()?;
    let path = marker.path().join("ran");

    let lookup = FakeIdentityLookup::new().with_user("root-ish", 0, 0, &[(0, "root")]);
    let queried = lookup.queried();
    let supervisor = Supervisor::new().with_resolver(CredentialResolver::new(lookup));

    let spec = ProcessSpec::new("touch", Duration::from_secs(5))
        .arg(path.to_string_lossy())
        .user("root-ish");
    let result = with_timeout(supervisor.run(&spec, OutputSinks::discard())).await;

    assert_eq!(result.status, RunStatus::Fail);
    assert!(matches!(result.error, Some(ProcwardenError::InvalidIdentity { .. })));
    assert!(!path.exists(), "no process should have been started");

    let spec = spec.user("ghost");
    let result = with_timeout(supervisor.run(&spec, OutputSinks::discard())).await;
    assert!(matches!(result.error, Some(ProcwardenError::UserNotFound(_))));

    // Credentials are resolved again on every run.
    assert_eq!(queried.lock().unwrap().len(), 2);
    Ok(())
}

/// An identity this test process can launch as: an unprivileged account when
/// running as root, otherwise the current identity (no switch needed).
fn launchable_identity() -> Option<(u32, u32, Vec<u32>)> {
    if Uid::effective().is_root() {
        return Some((65534, 65534, vec![65534]));
    }
    let gid = Gid::effective().as_raw();
    if gid == 0 {
        return None;
    }
    let groups = getgroups().ok()?.into_iter().map(|g| g.as_raw()).collect();
    Some((Uid::effective().as_raw(), gid, groups))
}

#[tokio::test]
async fn running_as_the_current_identity_needs_no_privileges() -> TestResult {
    init_tracing();

    if Uid::effective().is_root() {
        eprintln!("skipping: covered by the root-only test");
        return Ok(());
    }
    let Some((uid, gid, groups)) = launchable_identity() else {
        eprintln!("skipping: primary group is 0");
        return Ok(());
    };

    let entries: Vec<(u32, &str)> = groups.iter().map(|g| (*g, "member")).collect();
    let lookup = FakeIdentityLookup::new().with_user("self", uid, gid, &entries);
    let supervisor = Supervisor::new().with_resolver(CredentialResolver::new(lookup));

    let out = CaptureSink::new();
    let spec = ProcessSpec::shell("id -u", Duration::from_secs(5)).user("self");
    let result = with_timeout(supervisor.run(&spec, OutputSinks::discard().with_stdout(out.clone()))).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(out.contents_lossy().trim(), uid.to_string());
    Ok(())
}

#[tokio::test]
async fn cancel_while_resolving_kills_the_child_as_soon_as_it_starts() -> TestResult {
    init_tracing();

    let Some((uid, gid, groups)) = launchable_identity() else {
        eprintln!("skipping: primary group is 0");
        return Ok(());
    };

    let entries: Vec<(u32, &str)> = groups.iter().map(|g| (*g, "member")).collect();
    let (lookup, gate) = FakeIdentityLookup::new()
        .with_user("runner", uid, gid, &entries)
        .held();
    let supervisor = Arc::new(Supervisor::new().with_resolver(CredentialResolver::new(lookup)));

    // `$0` carries the marker so the shell can be found in /proc.
    let marker = format!("procwarden-cancel-during-start-{}", std::process::id());
    let spec = ProcessSpec::new("/bin/sh", Duration::from_secs(20))
        .arg("-c")
        .arg("sleep 30; :")
        .arg(&marker)
        .user("runner");
    let started = Instant::now();

    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run(&spec, OutputSinks::discard()).await })
    };

    for _ in 0..200 {
        if gate.entered() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(gate.entered(), "identity lookup was never reached");
    assert_eq!(supervisor.phase(), RunPhase::Starting);

    assert!(supervisor.cancel(), "cancel during start should be scheduled");
    assert_eq!(supervisor.phase(), RunPhase::KillRequested);
    gate.release();

    let result = with_timeout(runner).await?;

    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    assert_eq!(result.status, RunStatus::Fail);
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
    assert!(matches!(result.error, Some(ProcwardenError::Cancelled)), "{result:?}");
    assert_eq!(supervisor.phase(), RunPhase::Terminal);
    assert!(processes_with_arg(&marker).is_empty(), "child survived the cancel");
    Ok(())
}
