// src/lib.rs

pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, info_span};

use crate::cli::CliArgs;
use crate::config::{SupervisorSection, load_and_validate};
use crate::credentials::CredentialResolver;
use crate::errors::ProcwardenError;
use crate::exec::{OutputSinks, ProcessSpec, Supervisor};
use crate::types::SENTINEL_EXIT_CODE;

pub use crate::credentials::Credentials;
pub use crate::types::{RunResult, RunStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - job file loading and CLI overrides
/// - credential resolver selection
/// - the supervisor run (or a dry-run report)
/// - Ctrl-C → cancel
///
/// Returns the exit code the binary should exit with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let (spec, settings) = build_spec(&args)?;

    let supervisor = Supervisor::new()
        .with_resolver(CredentialResolver::for_source(settings.identity_source))
        .with_output_grace(settings.output_grace())
        .with_span(info_span!("procwarden", command = %spec.display_command()));

    if args.dry_run {
        print_dry_run(&spec, &supervisor).await?;
        return Ok(0);
    }

    // Ctrl-C → kill the process group.
    {
        let handle = supervisor.cancel_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; cancelling command");
            handle.cancel();
        });
    }

    if args.discard_output {
        let code = match supervisor.run_simple(&spec).await {
            Ok(()) => 0,
            Err(ProcwardenError::NonZeroExit(code)) => code,
            Err(err) => {
                error!(error = %err, "command failed");
                SENTINEL_EXIT_CODE
            }
        };
        return Ok(code);
    }

    let result = supervisor.run(&spec, OutputSinks::inherit()).await;
    match &result.error {
        Some(err) => error!(
            status = %result.status,
            exit_code = result.exit_code,
            error = %err,
            "command finished with error"
        ),
        None => info!(exit_code = result.exit_code, "command finished"),
    }

    Ok(result.exit_code)
}

/// Combine the optional job file with command-line overrides.
fn build_spec(args: &CliArgs) -> Result<(ProcessSpec, SupervisorSection)> {
    let (mut spec, mut settings) = match &args.job {
        Some(path) => {
            let job = load_and_validate(path)
                .with_context(|| format!("loading job file {}", path.display()))?;
            (job.process_spec(), job.supervisor)
        }
        None => {
            let command = args
                .command
                .first()
                .context("no command given; pass one after `--` or use --job")?;
            let secs = args
                .timeout
                .context("--timeout is required when no job file is given")?;
            (
                ProcessSpec::new(command, Duration::from_secs(secs)),
                SupervisorSection::default(),
            )
        }
    };

    if let Some((command, rest)) = args.command.split_first() {
        spec.command = PathBuf::from(command);
        spec.args = rest.to_vec();
    }
    if let Some(secs) = args.timeout {
        spec.timeout = Duration::from_secs(secs);
    }
    if let Some(user) = &args.user {
        spec.user = Some(user.clone());
    }
    if let Some(home) = &args.home {
        spec.home_dir = Some(home.clone());
    }
    if let Some(cwd) = &args.cwd {
        spec.working_dir = Some(cwd.clone());
    }
    if !args.env.is_empty() {
        let env = spec.env.get_or_insert_with(BTreeMap::new);
        for (key, value) in &args.env {
            env.insert(key.clone(), value.clone());
        }
    }
    if let Some(source) = args.identity_source {
        settings.identity_source = source;
    }

    spec.validate()?;
    Ok((spec, settings))
}

/// Print the resolved spec (and credentials) without running anything.
async fn print_dry_run(spec: &ProcessSpec, supervisor: &Supervisor) -> Result<()> {
    println!("procwarden dry-run");
    println!("  command: {}", spec.display_command());
    println!("  timeout: {:?}", spec.timeout);
    if let Some(dir) = &spec.working_dir {
        println!("  working_dir: {}", dir.display());
    }
    match &spec.env {
        Some(env) if !env.is_empty() => {
            println!("  env ({} explicit):", env.len());
            for key in env.keys() {
                println!("    - {key}");
            }
        }
        _ => println!("  env: inherited"),
    }
    if let Some(home) = &spec.home_dir {
        println!("  HOME: {}", home.display());
    }

    let creds = supervisor.resolve_credentials(spec).await?;
    if let (Some(user), Some(creds)) = (&spec.user, creds) {
        println!(
            "  user: {user} (uid={}, gid={}, groups={:?})",
            creds.uid, creds.gid, creds.groups
        );
    }

    debug!("dry-run complete (nothing executed)");
    Ok(())
}
