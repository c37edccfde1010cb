//! Run command handlers
//!
//! `direct-run` executes on this host; `run` asks Slurm for a node and runs
//! `direct-run` there with the terminal attached.

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use tracing::error;

use fireslurm_core::domain::log::{LATEST_ALIAS, RunStatus};
use fireslurm_runner::{RunExecutor, SystemShell};
use fireslurm_slurm::{BatchSubmitter, SlurmScheduler};

use super::JobArgs;
use crate::args::RunArgs;
use crate::config::Config;

/// Runs the simulation on this host
pub async fn direct_run(args: RunArgs, config: &Config) -> Result<()> {
    let spec = args.into_spec()?;
    let shell = Arc::new(SystemShell::new(config.dry_run));
    let executor = RunExecutor::new(config.host.clone(), shell);

    let report = match executor.execute(&spec).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run '{}' failed ({:?}): {}", spec.run_name, e.kind(), e);
            let latest = spec.log_root.join(LATEST_ALIAS);
            if latest.exists() {
                eprintln!(
                    "{} partial logs kept in {}",
                    "note:".yellow(),
                    latest.display()
                );
            }
            return Err(e).with_context(|| format!("Run '{}' aborted", spec.run_name));
        }
    };

    let outcome = &report.outcome;
    let status = match outcome.status {
        RunStatus::Succeeded => outcome.status.to_string().green(),
        RunStatus::GuestFailed | RunStatus::Cancelled => outcome.status.to_string().yellow(),
        RunStatus::DryRun => outcome.status.to_string().dimmed(),
    };

    println!();
    println!("{} {}", "Run".bold(), spec.run_name.cyan());
    println!("  {}: {}", "Status".bold(), status);
    if let Some(code) = outcome.exit_code {
        println!("  {}: {}", "Exit code".bold(), code);
    }
    println!("  {}: {:.1}s", "Wall time".bold(), outcome.wall_time_secs);
    println!("  {}: {}", "Logs".bold(), report.log_dir.display());
    if let Some(histogram) = &outcome.trace_histogram {
        println!("  {}: {}", "Trace histogram".bold(), histogram.display());
    }
    if let Some(results) = &outcome.results {
        println!("  {}: {}", "Results".bold(), results.display());
    }

    Ok(())
}

/// Runs the simulation on a cluster node through `srun --pty`
pub async fn srun(args: RunArgs, job: JobArgs, config: &Config) -> Result<()> {
    let spec = args.into_spec()?;
    let hints = job.into_hints(config);
    let submitter = BatchSubmitter::new(
        Arc::new(SlurmScheduler::new(config.slurm.clone())),
        config.slurm.clone(),
    );

    let code = submitter.run_attached(&spec, &hints).await?;
    if code != 0 {
        anyhow::bail!("srun exited with code {}", code);
    }

    Ok(())
}
