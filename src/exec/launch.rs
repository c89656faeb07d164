// src/exec/launch.rs

//! OS-level launch parameters for the child process.

use std::os::unix::process::CommandExt;
use std::process::{Command as StdCommand, Stdio};

use nix::unistd::{Gid, Uid, getgroups, setgid, setgroups, setuid};
use tokio::process::Command;

use crate::credentials::Credentials;
use crate::exec::spec::ProcessSpec;

/// Which output streams the supervisor will copy into sinks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Capture {
    pub stdout: bool,
    pub stderr: bool,
}

/// Build the `Command` for `spec`.
///
/// The child becomes the leader of a new process group so that the group
/// can be killed as a unit. Streams that are not captured go to
/// `/dev/null`; stdin is always closed.
pub(crate) fn build_command(
    spec: &ProcessSpec,
    credentials: Option<&Credentials>,
    capture: Capture,
) -> Command {
    let mut std_cmd = StdCommand::new(&spec.command);
    std_cmd.args(&spec.args);

    if let Some(dir) = &spec.working_dir {
        std_cmd.current_dir(dir);
    }

    std_cmd.env_clear();
    std_cmd.envs(spec.effective_environment());

    std_cmd
        .stdin(Stdio::null())
        .stdout(stdio_for(capture.stdout))
        .stderr(stdio_for(capture.stderr))
        .process_group(0);

    if let Some(creds) = credentials.filter(|c| !already_running_as(c)) {
        drop_privileges(&mut std_cmd, creds);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);
    cmd
}

fn stdio_for(captured: bool) -> Stdio {
    if captured { Stdio::piped() } else { Stdio::null() }
}

/// True when this process already has exactly `creds`, so the child needs
/// no switch (and an unprivileged caller can still "impersonate" itself).
fn already_running_as(creds: &Credentials) -> bool {
    let (uid, gid) = (Uid::from_raw(creds.uid), Gid::from_raw(creds.gid));
    if Uid::current() != uid || Uid::effective() != uid {
        return false;
    }
    if Gid::current() != gid || Gid::effective() != gid {
        return false;
    }
    let Ok(current) = getgroups() else {
        return false;
    };

    let mut have: Vec<u32> = current.iter().map(|g| g.as_raw()).collect();
    have.push(creds.gid);
    have.sort_unstable();
    have.dedup();

    let mut want = creds.groups.clone();
    want.push(creds.gid);
    want.sort_unstable();
    want.dedup();

    have == want
}

/// Switch to `creds` in the child between fork and exec.
///
/// Supplementary groups go first, then gid, then uid: after `setuid` the
/// child no longer has the privilege to change its groups.
fn drop_privileges(cmd: &mut StdCommand, creds: &Credentials) {
    let uid = Uid::from_raw(creds.uid);
    let gid = Gid::from_raw(creds.gid);
    let groups: Vec<Gid> = creds.groups.iter().copied().map(Gid::from_raw).collect();

    // SAFETY: the closure only issues setgroups/setgid/setuid syscalls on
    // memory allocated before the fork.
    unsafe {
        cmd.pre_exec(move || {
            setgroups(&groups)?;
            setgid(gid)?;
            setuid(uid)?;
            Ok(())
        });
    }
}
