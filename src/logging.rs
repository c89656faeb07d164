// src/logging.rs

//! Logging setup for the `procwarden` binary.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (a plain level for everything)
//! 2. `PROCWARDEN_LOG`, in `EnvFilter` syntax (`debug`,
//!    `procwarden::exec=trace,info`, ...)
//! 3. `info`
//!
//! An unparsable `PROCWARDEN_LOG` falls back to `info` with a warning.
//! Logs go to STDERR so the supervised command's stdout stays clean.
//! The library itself never installs a subscriber; it only records into
//! the span each `Supervisor` is configured with.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "PROCWARDEN_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let (filter, rejected) = build_filter(cli_level, env_value.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    if let Some(value) = rejected {
        tracing::warn!(var = LOG_ENV_VAR, %value, "ignoring invalid log filter");
    }
    Ok(())
}

/// Pick the filter for the given CLI flag and `PROCWARDEN_LOG` value.
///
/// The second element is the env value when it was present but invalid.
pub fn build_filter(
    cli_level: Option<LogLevel>,
    env_value: Option<&str>,
) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(directive_for(level)), None);
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        None => (EnvFilter::new(DEFAULT_DIRECTIVE), None),
        Some(value) => match EnvFilter::try_new(value) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(value.to_string())),
        },
    }
}

fn directive_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
