// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::ProcessSpec;
use crate::types::IdentitySource;

/// Job file as read from TOML, before validation.
///
/// ```toml
/// [supervisor]
/// output_grace_ms = 200
/// identity_source = "nss"
///
/// [job]
/// command = "sh"
/// args = ["-c", "echo hello"]
/// timeout_secs = 5
///
/// [job.env]
/// FOO = "bar"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawJobFile {
    /// Supervisor tuning from `[supervisor]`.
    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// The process to run, from `[job]`.
    pub job: JobSection,
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// How long to wait for output to drain after the child exits.
    #[serde(default = "default_output_grace_ms")]
    pub output_grace_ms: u64,

    /// `"nss"` (default) or `"id"`.
    #[serde(default)]
    pub identity_source: IdentitySource,
}

fn default_output_grace_ms() -> u64 {
    200
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            output_grace_ms: default_output_grace_ms(),
            identity_source: IdentitySource::default(),
        }
    }
}

impl SupervisorSection {
    pub fn output_grace(&self) -> Duration {
        Duration::from_millis(self.output_grace_ms)
    }
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    /// Executable path or name (looked up on `PATH`).
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// If `None`, the child starts in the supervisor's working directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Explicit environment; absent or empty inherits the supervisor's.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,

    /// Run as this user.
    #[serde(default)]
    pub user: Option<String>,

    /// Forced `HOME` for the child.
    #[serde(default)]
    pub home_dir: Option<PathBuf>,

    pub timeout_secs: u64,
}

/// A validated job file. Only obtainable through `TryFrom<RawJobFile>`.
#[derive(Debug, Clone)]
pub struct JobFile {
    pub supervisor: SupervisorSection,
    pub job: JobSection,
}

impl JobFile {
    pub(crate) fn new_unchecked(supervisor: SupervisorSection, job: JobSection) -> Self {
        Self { supervisor, job }
    }

    /// The `ProcessSpec` described by `[job]`.
    pub fn process_spec(&self) -> ProcessSpec {
        let job = &self.job;
        ProcessSpec {
            command: PathBuf::from(&job.command),
            args: job.args.clone(),
            working_dir: job.working_dir.clone(),
            env: job.env.clone(),
            user: job.user.clone(),
            home_dir: job.home_dir.clone(),
            timeout: Duration::from_secs(job.timeout_secs),
        }
    }
}
