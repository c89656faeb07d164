// src/exec/supervisor.rs

//! The process supervisor: launch one child, race its exit against a
//! timeout, and make sure nothing it started outlives the run.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::unistd::Pid;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::credentials::{CredentialResolver, Credentials};
use crate::errors::{ProcwardenError, Result};
use crate::exec::launch::build_command;
use crate::exec::output::{OutputSinks, spawn_copiers};
use crate::exec::spec::ProcessSpec;
use crate::exec::state::{CancelHandle, RunPhase, RunState};
use crate::types::{RunResult, RunStatus};

/// How long a finished run waits for its output copies to drain.
pub const DEFAULT_OUTPUT_GRACE: Duration = Duration::from_millis(200);

/// What the wait task observed when the child went away.
#[derive(Debug)]
pub struct WaitOutcome {
    pub status: Option<ExitStatus>,
    pub error: Option<io::Error>,
    /// A cancel request was pending when the child was reaped.
    pub cancelled: bool,
}

impl WaitOutcome {
    fn from_wait(waited: io::Result<ExitStatus>, cancelled: bool) -> Self {
        match waited {
            Ok(status) => Self {
                status: Some(status),
                error: None,
                cancelled,
            },
            Err(error) => Self {
                status: None,
                error: Some(error),
                cancelled,
            },
        }
    }

    /// The wait task went away without reporting anything.
    fn lost() -> Self {
        Self {
            status: None,
            error: Some(io::Error::other("wait task ended without reporting a process state")),
            cancelled: false,
        }
    }
}

/// Turn a wait outcome into a run result.
///
/// - A process state with an exit code wins, even if the wait also reported
///   an error or a cancel arrived too late to matter.
/// - A process killed by a signal is a failure: `Cancelled` when a cancel
///   request caused it, `Signaled` otherwise.
/// - No process state at all is a hard failure carrying the wait error.
pub fn classify_wait(outcome: WaitOutcome) -> RunResult {
    let Some(status) = outcome.status else {
        let err = outcome
            .error
            .unwrap_or_else(|| io::Error::other("wait returned no process state"));
        error!(error = %err, "wait returned no process state");
        return RunResult::failed(ProcwardenError::Wait(err));
    };

    if let Some(err) = &outcome.error {
        warn!(error = %err, "wait returned an error with a valid process state; trusting the state");
    }

    match status.code() {
        Some(code) => RunResult::exited(code),
        None if outcome.cancelled => RunResult::failed(ProcwardenError::Cancelled),
        None => RunResult::failed(ProcwardenError::Signaled(status.signal().unwrap_or_default())),
    }
}

/// Supervises one child process at a time.
///
/// Share it behind an `Arc` (or hand out [`CancelHandle`]s) to cancel from
/// elsewhere. Overlapping `run` calls on one instance are rejected with
/// [`ProcwardenError::Busy`].
#[derive(Debug)]
pub struct Supervisor {
    resolver: CredentialResolver,
    span: Span,
    output_grace: Duration,
    state: RunState,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            resolver: CredentialResolver::system(),
            span: info_span!("supervisor"),
            output_grace: DEFAULT_OUTPUT_GRACE,
            state: RunState::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Span every run of this supervisor is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_output_grace(mut self, grace: Duration) -> Self {
        self.output_grace = grace;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.state.clone())
    }

    /// Kill the current child's process group. No-op without a live child.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run `spec` to completion, timeout or failure.
    ///
    /// Never panics for expected failures; everything is reported in the
    /// returned [`RunResult`].
    pub async fn run(&self, spec: &ProcessSpec, sinks: OutputSinks) -> RunResult {
        async {
            let generation = match self.state.begin() {
                Ok(generation) => generation,
                Err(err) => {
                    warn!(command = %spec.display_command(), "supervisor busy; rejecting run");
                    return RunResult::failed(err);
                }
            };

            let result = self.supervise(spec, sinks, generation).await;
            self.state.finish();
            result
        }
        .instrument(self.span.clone())
        .await
    }

    /// Run with output discarded; any outcome other than exit code 0 is an
    /// error.
    pub async fn run_simple(&self, spec: &ProcessSpec) -> Result<()> {
        self.run(spec, OutputSinks::discard()).await.into_result()
    }

    /// Validate `spec` and resolve its target user, without launching.
    pub async fn resolve_credentials(&self, spec: &ProcessSpec) -> Result<Option<Credentials>> {
        spec.validate()?;

        let Some(user) = spec.user.clone() else {
            return Ok(None);
        };

        let resolver = self.resolver.clone();
        let creds = tokio::task::spawn_blocking(move || resolver.resolve(&user))
            .await
            .map_err(|e| ProcwardenError::Other(e.into()))??;
        Ok(Some(creds))
    }

    async fn supervise(&self, spec: &ProcessSpec, sinks: OutputSinks, generation: u64) -> RunResult {
        let credentials = match self.resolve_credentials(spec).await {
            Ok(creds) => creds,
            Err(err) => {
                error!(command = %spec.display_command(), error = %err, "pre-launch setup failed");
                return RunResult::failed(err);
            }
        };

        let result = self
            .launch_and_wait(spec, credentials.as_ref(), sinks, generation)
            .await;

        if let Some(creds) = &credentials {
            if let Err(err) = release_credentials(creds) {
                warn!(uid = creds.uid, error = %err, "credential cleanup failed");
            }
        }

        result
    }

    async fn launch_and_wait(
        &self,
        spec: &ProcessSpec,
        credentials: Option<&Credentials>,
        sinks: OutputSinks,
        generation: u64,
    ) -> RunResult {
        let command = spec.display_command();
        let mut cmd = build_command(spec, credentials, sinks.capture());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(command = %command, error = %source, "start command fail");
                return RunResult::failed(ProcwardenError::CommandStart { command, source });
            }
        };

        let Some(raw_pid) = child.id() else {
            return RunResult::failed(ProcwardenError::Wait(io::Error::other(
                "child was reaped before its pid was recorded",
            )));
        };
        let pid = Pid::from_raw(raw_pid as i32);
        self.state.running(pid);

        info!(
            pid = raw_pid,
            command = %command,
            user = ?spec.user,
            timeout = ?spec.timeout,
            "command started"
        );

        let mut copiers = spawn_copiers(&mut child, sinks);

        // Capacity-one channel: if the timeout wins, the wait task still
        // sends without blocking and the value is dropped.
        let (tx, rx) = oneshot::channel::<WaitOutcome>();
        let state = self.state.clone();
        tokio::spawn(
            async move {
                let waited = child.wait().await;
                let cancelled = state.exited(generation);
                let _ = tx.send(WaitOutcome::from_wait(waited, cancelled));
            }
            .in_current_span(),
        );

        tokio::select! {
            biased;

            received = rx => {
                let result = classify_wait(received.unwrap_or_else(|_| WaitOutcome::lost()));
                info!(
                    pid = raw_pid,
                    exit_code = result.exit_code,
                    status = %result.status,
                    "command execute completed"
                );
                if result.status == RunStatus::Success
                    && !drain_output(&mut copiers, self.output_grace).await
                {
                    // A descendant still holds the pipes open.
                    debug!(grace = ?self.output_grace, "output still open after grace period");
                    self.state.kill_leftovers();
                    drain_output(&mut copiers, self.output_grace).await;
                }
                result
            }

            _ = tokio::time::sleep(spec.timeout) => {
                warn!(
                    pid = raw_pid,
                    command = %command,
                    timeout = ?spec.timeout,
                    "command execute timeout; killing process group"
                );
                self.state.timed_out();
                RunResult::timed_out(ProcwardenError::Timeout(spec.timeout))
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Give the copy tasks up to `grace` to move the last buffered output.
/// Returns false if some copy is still running; it stays in `copiers`.
async fn drain_output(copiers: &mut Vec<JoinHandle<()>>, grace: Duration) -> bool {
    tokio::time::timeout(grace, async {
        while let Some(handle) = copiers.last_mut() {
            let _ = handle.await;
            copiers.pop();
        }
    })
    .await
    .is_ok()
}

/// Teardown hook for impersonated runs. Nothing is held per session yet.
fn release_credentials(creds: &Credentials) -> Result<()> {
    debug!(uid = creds.uid, gid = creds.gid, "released impersonation credentials");
    Ok(())
}
