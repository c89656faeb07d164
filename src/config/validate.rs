// src/config/validate.rs

use crate::config::model::{JobFile, JobSection, RawJobFile};
use crate::errors::{ProcwardenError, Result};

impl TryFrom<RawJobFile> for JobFile {
    type Error = ProcwardenError;

    fn try_from(raw: RawJobFile) -> std::result::Result<Self, Self::Error> {
        validate_job(&raw.job)?;
        Ok(JobFile::new_unchecked(raw.supervisor, raw.job))
    }
}

fn validate_job(job: &JobSection) -> Result<()> {
    if job.command.trim().is_empty() {
        return Err(ProcwardenError::ConfigError(
            "[job].command must not be empty".to_string(),
        ));
    }

    if job.timeout_secs == 0 {
        return Err(ProcwardenError::ConfigError(
            "[job].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(user) = &job.user {
        if user.trim().is_empty() {
            return Err(ProcwardenError::ConfigError(
                "[job].user must not be empty when set".to_string(),
            ));
        }
    }

    if let Some(env) = &job.env {
        for key in env.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ProcwardenError::ConfigError(format!(
                    "[job.env] has invalid variable name {key:?}"
                )));
            }
        }
    }

    Ok(())
}
