// src/credentials/resolver.rs

use std::sync::Arc;

use tracing::{debug, warn};

use crate::credentials::lookup::{IdCommandLookup, IdentityLookup, SystemIdentityLookup};
use crate::credentials::report::parse_group_ids;
use crate::errors::{ProcwardenError, Result};
use crate::types::IdentitySource;

/// Numeric identity applied to a child before it execs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups, in report order, without duplicates.
    pub groups: Vec<u32>,
}

/// Resolves a user name into `Credentials`.
///
/// Nothing is cached: every call queries the lookup again.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    lookup: Arc<dyn IdentityLookup>,
}

impl CredentialResolver {
    pub fn new(lookup: impl IdentityLookup + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Resolver backed by the host identity database.
    pub fn system() -> Self {
        Self::new(SystemIdentityLookup)
    }

    pub fn for_source(source: IdentitySource) -> Self {
        match source {
            IdentitySource::Nss => Self::system(),
            IdentitySource::Id => Self::new(IdCommandLookup::new()),
        }
    }

    /// Resolve `user` into uid, gid and supplementary groups.
    ///
    /// Fails when the user does not exist, the lookup itself fails, a group
    /// entry cannot be parsed, or uid/gid is 0. Root is never a valid
    /// impersonation target.
    pub fn resolve(&self, user: &str) -> Result<Credentials> {
        validate_user_name(user)?;

        let record = self
            .lookup
            .lookup(user)?
            .ok_or_else(|| ProcwardenError::UserNotFound(user.to_string()))?;

        let groups = parse_group_ids(&record.report)?;

        if record.uid == 0 || record.gid == 0 {
            warn!(user, uid = record.uid, gid = record.gid, "refusing non-positive identity");
            return Err(ProcwardenError::InvalidIdentity {
                user: user.to_string(),
                uid: record.uid,
                gid: record.gid,
            });
        }

        debug!(user, uid = record.uid, gid = record.gid, ?groups, "resolved credentials");

        Ok(Credentials {
            uid: record.uid,
            gid: record.gid,
            groups,
        })
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::system()
    }
}

fn validate_user_name(user: &str) -> Result<()> {
    let invalid = |why: &str| ProcwardenError::IdentityLookup {
        user: user.to_string(),
        reason: why.to_string(),
    };

    if user.is_empty() {
        return Err(invalid("user name is empty"));
    }
    if user.starts_with('-') {
        return Err(invalid("user name must not start with '-'"));
    }
    if user.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("user name contains whitespace or control characters"));
    }
    Ok(())
}
