// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`spec`] holds `ProcessSpec`, the caller's description of one run.
//! - [`launch`] turns a spec (plus resolved credentials) into a
//!   `tokio::process::Command` in its own process group.
//! - [`output`] defines output sinks and the copy tasks feeding them.
//! - [`state`] tracks the run phase and backs the `CancelHandle`.
//! - [`supervisor`] runs a child, races its exit against the timeout and
//!   classifies the result.

pub(crate) mod launch;
pub mod output;
pub mod spec;
pub mod state;
pub mod supervisor;

pub use output::{BoxedSink, CaptureSink, OutputSinks};
pub use spec::ProcessSpec;
pub use state::{CancelHandle, RunPhase};
pub use supervisor::{DEFAULT_OUTPUT_GRACE, Supervisor, WaitOutcome, classify_wait};
