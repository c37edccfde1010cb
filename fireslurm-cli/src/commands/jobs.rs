//! Job registry commands
//!
//! Thin wrappers over `squeue` and `scancel`.

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use fireslurm_core::domain::job::{ClusterJob, JobId, JobState};
use fireslurm_slurm::{Scheduler, SlurmScheduler};

use crate::config::Config;

/// Jobs subcommands
#[derive(Subcommand)]
pub enum JobsCommands {
    /// List queued and running jobs
    List {
        /// Only jobs of this user (default: the current user)
        #[arg(long, env = "USER")]
        user: Option<String>,

        /// Jobs of every user
        #[arg(long)]
        all: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel a job
    Cancel {
        /// Slurm job id
        id: JobId,
    },
}

/// Handle jobs commands
pub async fn handle_jobs_command(command: JobsCommands, config: &Config) -> Result<()> {
    let scheduler = SlurmScheduler::new(config.slurm.clone());

    match command {
        JobsCommands::List { user, all, json } => {
            let user = if all { None } else { user };
            list_jobs(&scheduler, user.as_deref(), json).await
        }
        JobsCommands::Cancel { id } => cancel_job(&scheduler, id, config.dry_run).await,
    }
}

async fn list_jobs(scheduler: &dyn Scheduler, user: Option<&str>, json: bool) -> Result<()> {
    let jobs = scheduler.list_jobs(user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    println!();
    for job in jobs {
        print_job_summary(&job);
    }

    Ok(())
}

async fn cancel_job(scheduler: &dyn Scheduler, id: JobId, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{} would cancel job {}", "[dry-run]".yellow(), id);
        return Ok(());
    }

    scheduler.cancel(id).await?;
    println!("{}", format!("✓ Job {} cancelled", id).green());

    Ok(())
}

/// Print a one-line job summary
fn print_job_summary(job: &ClusterJob) {
    let state = match &job.state {
        JobState::Running | JobState::Completing => job.state.to_string().green(),
        JobState::Pending => job.state.to_string().yellow(),
        JobState::Failed | JobState::Timeout | JobState::Cancelled => job.state.to_string().red(),
        _ => job.state.to_string().normal(),
    };

    println!(
        "  {} {} [{}] {} {}",
        job.id.to_string().cyan(),
        job.name.bold(),
        state,
        job.partition.as_deref().unwrap_or("-").dimmed(),
        job.nodes.as_deref().unwrap_or("").dimmed()
    );
}
