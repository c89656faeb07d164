// src/credentials/lookup.rs

//! Pluggable identity lookup.
//!
//! The resolver talks to an `IdentityLookup` instead of calling the host
//! directly, so tests can supply a fixed table of users while production
//! code queries the real identity database.

use std::ffi::CString;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Command;

use nix::unistd::{Gid, Group, User, getgrouplist};
use tracing::debug;

use crate::credentials::report::render_identity_report;
use crate::errors::{ProcwardenError, Result};

/// Raw identity data for one user, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub uid: u32,
    pub gid: u32,
    /// `uid=.. gid=.. groups=..` report text.
    pub report: String,
}

/// Trait abstracting where identity data comes from.
pub trait IdentityLookup: Send + Sync + Debug {
    /// Look up `user`. Returns `Ok(None)` when the user does not exist.
    fn lookup(&self, user: &str) -> Result<Option<IdentityRecord>>;
}

/// Lookup backed by the host identity database (`getpwnam_r`,
/// `getgrouplist`, `getgrgid_r`). No external process is spawned.
#[derive(Debug, Clone, Default)]
pub struct SystemIdentityLookup;

impl IdentityLookup for SystemIdentityLookup {
    fn lookup(&self, user: &str) -> Result<Option<IdentityRecord>> {
        let Some(entry) = User::from_name(user).map_err(|e| lookup_error(user, e))? else {
            return Ok(None);
        };

        let c_name = CString::new(user).map_err(|e| lookup_error(user, e))?;
        let gids = getgrouplist(&c_name, entry.gid).map_err(|e| lookup_error(user, e))?;

        let groups: Vec<(u32, String)> = gids
            .into_iter()
            .map(|gid| (gid.as_raw(), group_label(gid)))
            .collect();
        let primary = group_label(entry.gid);
        let report = render_identity_report(
            user,
            entry.uid.as_raw(),
            (entry.gid.as_raw(), &primary),
            &groups,
        );

        debug!(user, uid = entry.uid.as_raw(), gid = entry.gid.as_raw(), "identity database lookup");

        Ok(Some(IdentityRecord {
            uid: entry.uid.as_raw(),
            gid: entry.gid.as_raw(),
            report,
        }))
    }
}

/// Group name for display, falling back to the numeric id.
fn group_label(gid: Gid) -> String {
    match Group::from_gid(gid) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

/// Lookup backed by the `id` utility.
///
/// The user name is passed as a separate argument, never through a shell.
#[derive(Debug, Clone)]
pub struct IdCommandLookup {
    program: PathBuf,
}

impl IdCommandLookup {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("id"),
        }
    }

    /// Use a different `id`-compatible executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `id [flag] <user>`; `Ok(None)` if `id` reports an unknown user.
    fn query(&self, user: &str, flag: Option<&str>) -> Result<Option<String>> {
        let mut cmd = Command::new(&self.program);
        if let Some(flag) = flag {
            cmd.arg(flag);
        }
        cmd.arg(user).env("LC_ALL", "C");

        let output = cmd.output().map_err(|e| lookup_error(user, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if reports_unknown_user(&stderr) {
                return Ok(None);
            }
            return Err(lookup_error(
                user,
                format!("`id` exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn query_id(&self, user: &str, flag: &str) -> Result<Option<u32>> {
        let Some(text) = self.query(user, Some(flag))? else {
            return Ok(None);
        };
        text.parse::<u32>()
            .map(Some)
            .map_err(|_| lookup_error(user, format!("unexpected `id {flag}` output: {text:?}")))
    }
}

impl Default for IdCommandLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityLookup for IdCommandLookup {
    fn lookup(&self, user: &str) -> Result<Option<IdentityRecord>> {
        let Some(uid) = self.query_id(user, "-u")? else {
            return Ok(None);
        };
        let Some(gid) = self.query_id(user, "-g")? else {
            return Ok(None);
        };
        let Some(report) = self.query(user, None)? else {
            return Ok(None);
        };

        debug!(user, uid, gid, "`id` lookup");

        Ok(Some(IdentityRecord { uid, gid, report }))
    }
}

/// Unknown-user wording of the common `id` implementations in the C
/// locale: coreutils and BSD say "no such user", BusyBox "unknown user".
fn reports_unknown_user(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("no such user") || stderr.contains("unknown user")
}

fn lookup_error(user: &str, reason: impl ToString) -> ProcwardenError {
    ProcwardenError::IdentityLookup {
        user: user.to_string(),
        reason: reason.to_string(),
    }
}
