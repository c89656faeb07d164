// src/errors.rs

//! Crate-wide error type and `Result` alias.

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcwardenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid process spec: {0}")]
    InvalidSpec(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Identity lookup failed for user '{user}': {reason}")]
    IdentityLookup { user: String, reason: String },

    #[error("Malformed group entry '{entry}' in identity report")]
    MalformedGroups { entry: String },

    #[error("Invalid identity for user '{user}': uid={uid} gid={gid}")]
    InvalidIdentity { user: String, uid: u32, gid: u32 },

    #[error("Error occurred starting the command '{command}': {source}")]
    CommandStart {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command execute timeout after {0:?}")]
    Timeout(Duration),

    #[error("Waiting for the command failed: {0}")]
    Wait(#[source] io::Error),

    #[error("Command terminated by signal {0}")]
    Signaled(i32),

    #[error("Command was cancelled")]
    Cancelled,

    #[error("Command exited with code {0}")]
    NonZeroExit(i32),

    #[error("Supervisor is already running a process")]
    Busy,

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcwardenError {
    /// True for errors raised while resolving a target user's identity.
    pub fn is_identity_error(&self) -> bool {
        matches!(
            self,
            ProcwardenError::UserNotFound(_)
                | ProcwardenError::IdentityLookup { .. }
                | ProcwardenError::MalformedGroups { .. }
                | ProcwardenError::InvalidIdentity { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcwardenError>;
