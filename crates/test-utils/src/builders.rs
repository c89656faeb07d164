#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use procwarden::config::{JobFile, JobSection, RawJobFile, SupervisorSection};
use procwarden::types::IdentitySource;

/// Builder for `JobFile` to simplify test setup.
pub struct JobFileBuilder {
    raw: RawJobFile,
}

impl JobFileBuilder {
    pub fn new(command: &str, timeout_secs: u64) -> Self {
        Self {
            raw: RawJobFile {
                supervisor: SupervisorSection::default(),
                job: JobSection {
                    command: command.to_string(),
                    args: vec![],
                    working_dir: None,
                    env: None,
                    user: None,
                    home_dir: None,
                    timeout_secs,
                },
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.raw.job.args.push(arg.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.raw
            .job
            .env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.job.working_dir = Some(dir.into());
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.raw.job.user = Some(user.to_string());
        self
    }

    pub fn home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.raw.job.home_dir = Some(home.into());
        self
    }

    pub fn output_grace_ms(mut self, ms: u64) -> Self {
        self.raw.supervisor.output_grace_ms = ms;
        self
    }

    pub fn identity_source(mut self, source: IdentitySource) -> Self {
        self.raw.supervisor.identity_source = source;
        self
    }

    pub fn build_raw(self) -> RawJobFile {
        self.raw
    }

    pub fn build(self) -> JobFile {
        JobFile::try_from(self.raw).expect("Failed to build valid job file from builder")
    }
}
