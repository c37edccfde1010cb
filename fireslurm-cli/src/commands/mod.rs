//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod batch;
mod bundles;
mod jobs;
mod run;
mod sync;

pub use batch::JobArgs;
pub use jobs::JobsCommands;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::args::RunArgs;
use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot a finished build into a new immutable bundle
    Sync {
        /// Logical config name; `<config dir>/<name>` points at the newest bundle
        #[arg(long)]
        name: String,

        /// Human description stored with the bundle
        #[arg(long)]
        description: String,

        /// Directory holding the build archives
        #[arg(long, default_value = ".")]
        source: PathBuf,

        /// Directory holding synced bundles
        #[arg(long, env = "FIRESLURM_CONFIG_DIR", default_value = "configs")]
        config_dir: PathBuf,
    },
    /// List synced bundles
    Bundles {
        /// Directory holding synced bundles
        #[arg(long, env = "FIRESLURM_CONFIG_DIR", default_value = "configs")]
        config_dir: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a simulation on this host (must be the FPGA host)
    DirectRun(RunArgs),
    /// Run a simulation interactively on a cluster node through srun
    Run {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        job: JobArgs,
    },
    /// Queue a simulation as a Slurm batch job
    Batch {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        job: JobArgs,
    },
    /// Queue every combination in a sweep file as batch jobs
    Sweep {
        /// JSON sweep file
        file: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },
    /// Inspect and cancel queued jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Sync {
            name,
            description,
            source,
            config_dir,
        } => sync::handle_sync(&config_dir, &name, &description, &source, config),
        Commands::Bundles { config_dir, json } => bundles::list_bundles(&config_dir, json),
        Commands::DirectRun(run) => run::direct_run(run, config).await,
        Commands::Run { run, job } => run::srun(run, job, config).await,
        Commands::Batch { run, job } => batch::submit(run, job, config).await,
        Commands::Sweep { file, job } => batch::submit_sweep(&file, job, config).await,
        Commands::Jobs { command } => jobs::handle_jobs_command(command, config).await,
    }
}
