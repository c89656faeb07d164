// src/exec/spec.rs

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ProcwardenError, Result};

/// Everything needed to launch one supervised process.
///
/// Built by the caller and only borrowed by the supervisor during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub command: PathBuf,
    pub args: Vec<String>,
    /// `None` keeps the supervisor's own working directory.
    pub working_dir: Option<PathBuf>,
    /// `None` (or an empty map) inherits the supervisor's environment.
    pub env: Option<BTreeMap<String, String>>,
    /// Run the child as this user.
    pub user: Option<String>,
    /// Forced `HOME` value for the child.
    pub home_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env: None,
            user: None,
            home_dir: None,
            timeout,
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: impl Into<String>, timeout: Duration) -> Self {
        Self::new("sh", timeout).arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add one variable to an explicit environment.
    ///
    /// Once any variable is set the child no longer inherits the
    /// supervisor's environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line, for logs.
    pub fn display_command(&self) -> String {
        let mut line = self.command.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Check the spec before anything is launched.
    pub fn validate(&self) -> Result<()> {
        if self.command.as_os_str().is_empty() {
            return Err(ProcwardenError::InvalidSpec("command must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ProcwardenError::InvalidSpec("timeout must be greater than zero".to_string()));
        }
        if let Some(user) = &self.user {
            if user.trim().is_empty() {
                return Err(ProcwardenError::InvalidSpec("user must not be empty".to_string()));
            }
        }
        if let Some(env) = &self.env {
            for key in env.keys() {
                if key.is_empty() || key.contains('=') || key.contains('\0') {
                    return Err(ProcwardenError::InvalidSpec(format!(
                        "invalid environment variable name {key:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The environment the child will see.
    ///
    /// Starts from the explicit environment, or from the supervisor's own
    /// when none (or an empty one) was given, then applies the `HOME`
    /// override.
    pub fn effective_environment(&self) -> BTreeMap<OsString, OsString> {
        let mut env: BTreeMap<OsString, OsString> = match &self.env {
            Some(vars) if !vars.is_empty() => vars
                .iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v)))
                .collect(),
            _ => std::env::vars_os().collect(),
        };

        if let Some(home) = &self.home_dir {
            env.insert(OsString::from("HOME"), home.clone().into_os_string());
        }

        env
    }
}
