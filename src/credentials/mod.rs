// src/credentials/mod.rs

//! Credential resolution for running a child as another user.
//!
//! - [`lookup`] defines the `IdentityLookup` seam and its two host-backed
//!   implementations (libc identity database, `id` utility).
//! - [`report`] parses and renders the `uid=.. gid=.. groups=..` identity
//!   report both lookups produce.
//! - [`resolver`] turns a user name into validated `Credentials`.

pub mod lookup;
pub mod report;
pub mod resolver;

pub use lookup::{IdCommandLookup, IdentityLookup, IdentityRecord, SystemIdentityLookup};
pub use report::{parse_group_ids, render_identity_report};
pub use resolver::{CredentialResolver, Credentials};
