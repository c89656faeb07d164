use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{ProcwardenError, Result};

/// Exit code reported when no real exit code is available (start failure,
/// timeout, signal termination, lost wait state).
pub const SENTINEL_EXIT_CODE: i32 = 1;

/// Classification of a finished run.
///
/// - `Success`: the child exited on its own with an exit code. The code may
///   still be non-zero; interpreting it is up to the caller.
/// - `Fail`: the child could not be started, was killed by a signal or by a
///   cancel request, or its wait state was lost.
/// - `Timeout`: the timeout fired first and the process group was killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Fail,
    Timeout,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
            RunStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Outcome of one supervised run.
///
/// Exactly one of {natural exit, killed on timeout, start failure} produced
/// it. `error` is `None` only for a clean natural exit.
#[derive(Debug)]
pub struct RunResult {
    pub exit_code: i32,
    pub status: RunStatus,
    pub error: Option<ProcwardenError>,
}

impl RunResult {
    pub(crate) fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            status: RunStatus::Success,
            error: None,
        }
    }

    pub(crate) fn failed(error: ProcwardenError) -> Self {
        Self {
            exit_code: SENTINEL_EXIT_CODE,
            status: RunStatus::Fail,
            error: Some(error),
        }
    }

    pub(crate) fn timed_out(error: ProcwardenError) -> Self {
        Self {
            exit_code: SENTINEL_EXIT_CODE,
            status: RunStatus::Timeout,
            error: Some(error),
        }
    }

    /// True when the child exited on its own with code 0.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success && self.exit_code == 0
    }

    /// Collapse the result into a plain `Result`, treating non-zero exit
    /// codes as errors.
    pub fn into_result(self) -> Result<()> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.exit_code != 0 {
            return Err(ProcwardenError::NonZeroExit(self.exit_code));
        }
        Ok(())
    }
}

/// Where the credential resolver gets its identity data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Host identity database via libc (passwd / group lookups).
    Nss,
    /// The `id` utility, invoked without a shell.
    Id,
}

impl Default for IdentitySource {
    fn default() -> Self {
        IdentitySource::Nss
    }
}

impl FromStr for IdentitySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nss" => Ok(IdentitySource::Nss),
            "id" => Ok(IdentitySource::Id),
            other => Err(format!(
                "invalid identity_source: {other} (expected \"nss\" or \"id\")"
            )),
        }
    }
}
