//! Batch and sweep submission

use anyhow::Result;
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fireslurm_core::domain::job::ClusterJob;
use fireslurm_slurm::{BatchSubmitter, SchedulingHints, SlurmScheduler, SweepSpec};

use crate::args::RunArgs;
use crate::config::Config;

/// Scheduling options for cluster jobs
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Slurm job name (default: fireslurm-<run name>)
    #[arg(long)]
    pub job_name: Option<String>,

    /// Share the node with other jobs
    #[arg(long)]
    pub no_exclusive: bool,

    /// Slurm stdout template (default: <results dir>/slurm-log/%j.out)
    #[arg(long)]
    pub slurm_output: Option<PathBuf>,

    /// Slurm stderr template (default: <results dir>/slurm-log/%j.err)
    #[arg(long)]
    pub slurm_error: Option<PathBuf>,
}

impl JobArgs {
    pub fn into_hints(self, config: &Config) -> SchedulingHints {
        SchedulingHints {
            job_name: self.job_name,
            exclusive: !self.no_exclusive,
            output: self.slurm_output,
            error: self.slurm_error,
            verbosity: config.verbosity,
            dry_run: config.dry_run,
        }
    }
}

fn submitter(config: &Config) -> BatchSubmitter {
    BatchSubmitter::new(
        Arc::new(SlurmScheduler::new(config.slurm.clone())),
        config.slurm.clone(),
    )
}

/// Queues one run
pub async fn submit(args: RunArgs, job: JobArgs, config: &Config) -> Result<()> {
    let spec = args.into_spec()?;
    let hints = job.into_hints(config);

    let job = submitter(config).submit(&spec, &hints).await?;
    print_submitted(&job, config.dry_run);

    Ok(())
}

/// Queues every run of a sweep file
pub async fn submit_sweep(file: &Path, job: JobArgs, config: &Config) -> Result<()> {
    let sweep = SweepSpec::load(file)?;
    let hints = job.into_hints(config);

    let submissions = submitter(config).submit_sweep(&sweep, &hints).await?;

    let mut failed = 0;
    for submission in &submissions {
        match &submission.result {
            Ok(job) => print_submitted(job, config.dry_run),
            Err(e) => {
                failed += 1;
                println!(
                    "{} {}: {}",
                    "✗".red(),
                    submission.run_name.bold(),
                    e.to_string().red()
                );
            }
        }
    }

    println!();
    println!(
        "{}",
        format!(
            "{} submitted, {} rejected",
            submissions.len() - failed,
            failed
        )
        .bold()
    );
    if failed > 0 {
        anyhow::bail!("{} of {} submissions were rejected", failed, submissions.len());
    }

    Ok(())
}

fn print_submitted(job: &ClusterJob, dry_run: bool) {
    let verb = if dry_run { "Accepted (test only)" } else { "Submitted" };
    println!(
        "{} {} job {} {}",
        "✓".green(),
        verb,
        job.id.to_string().cyan(),
        job.name.bold()
    );
    if let Some(output) = &job.output {
        println!("    {}: {}", "Output".dimmed(), output.display());
    }
}
