// src/exec/state.rs

//! Per-supervisor run state and the cancel handle built on top of it.
//!
//! Phases move as:
//!
//! ```text
//! Unstarted -> Starting -> Running -> {Exited | TimedOut | KillRequested} -> Terminal
//!              Starting -> Terminal            (launch error)
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::errors::{ProcwardenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Unstarted,
    Starting,
    Running,
    Exited,
    TimedOut,
    KillRequested,
    Terminal,
}

#[derive(Debug)]
struct Inner {
    phase: RunPhase,
    /// Process group id of the live child (equal to its pid).
    pgid: Option<Pid>,
    /// Bumped on every `begin`, so a wait task from an earlier run cannot
    /// touch the current one.
    generation: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct RunState {
    inner: Arc<Mutex<Inner>>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: RunPhase::Unstarted,
                pgid: None,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn phase(&self) -> RunPhase {
        self.lock().phase
    }

    /// Claim the supervisor for a new run and return its generation.
    pub(crate) fn begin(&self) -> Result<u64> {
        let mut inner = self.lock();
        match inner.phase {
            RunPhase::Unstarted | RunPhase::Terminal => {
                inner.phase = RunPhase::Starting;
                inner.pgid = None;
                inner.generation += 1;
                Ok(inner.generation)
            }
            _ => Err(ProcwardenError::Busy),
        }
    }

    /// Record the freshly spawned child. A cancel that arrived while the
    /// child was starting is applied now.
    pub(crate) fn running(&self, pid: Pid) {
        let mut inner = self.lock();
        inner.pgid = Some(pid);
        if inner.phase == RunPhase::KillRequested {
            info!(pid = pid.as_raw(), "cancel requested during start; killing process group");
            signal_group(pid, Signal::SIGKILL);
        } else {
            inner.phase = RunPhase::Running;
        }
    }

    /// The leader of run `generation` has been reaped. Returns true when the
    /// exit was caused by a cancel request.
    ///
    /// The group id is kept until [`finish`](Self::finish): descendants may
    /// still be alive in it, and a timeout that races this call must still
    /// be able to kill them.
    pub(crate) fn exited(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        match inner.phase {
            RunPhase::KillRequested => true,
            RunPhase::Running => {
                inner.phase = RunPhase::Exited;
                false
            }
            _ => false,
        }
    }

    /// The timeout fired: kill the whole group.
    pub(crate) fn timed_out(&self) {
        let mut inner = self.lock();
        inner.phase = RunPhase::TimedOut;
        if let Some(pgid) = inner.pgid.take() {
            signal_group(pgid, Signal::SIGKILL);
        }
    }

    /// Kill whatever is left in the group after the leader exited.
    pub(crate) fn kill_leftovers(&self) -> bool {
        let inner = self.lock();
        match inner.pgid {
            Some(pgid) => signal_group(pgid, Signal::SIGKILL),
            None => false,
        }
    }

    /// End the run. Any process still in the group is killed first.
    pub(crate) fn finish(&self) {
        let mut inner = self.lock();
        inner.phase = RunPhase::Terminal;
        if let Some(pgid) = inner.pgid.take() {
            if signal_group(pgid, Signal::SIGKILL) {
                info!(pgid = pgid.as_raw(), "killed processes left behind by the command");
            }
        }
    }

    fn cancel(&self) -> bool {
        let mut inner = self.lock();
        match inner.phase {
            RunPhase::Starting => {
                inner.phase = RunPhase::KillRequested;
                true
            }
            RunPhase::Running => {
                inner.phase = RunPhase::KillRequested;
                match inner.pgid {
                    Some(pgid) => signal_group(pgid, Signal::SIGKILL),
                    None => false,
                }
            }
            phase => {
                debug!(?phase, "cancel requested with no live process; ignoring");
                false
            }
        }
    }
}

/// Best-effort signal to a whole process group. A group that is already
/// gone is not an error.
fn signal_group(pgid: Pid, signal: Signal) -> bool {
    match killpg(pgid, signal) {
        Ok(()) => {
            debug!(pgid = pgid.as_raw(), ?signal, "signalled process group");
            true
        }
        Err(Errno::ESRCH) => {
            debug!(pgid = pgid.as_raw(), "process group already gone");
            false
        }
        Err(e) => {
            warn!(pgid = pgid.as_raw(), ?signal, error = %e, "failed to signal process group");
            false
        }
    }
}

/// Cloneable handle that kills the supervisor's current process group.
///
/// Safe to use at any time: with no live process it does nothing.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: RunState,
}

impl CancelHandle {
    pub(crate) fn new(state: RunState) -> Self {
        Self { state }
    }

    /// Request termination of the running child and its descendants.
    ///
    /// Returns true if a kill was issued or scheduled.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }
}
