//! FireSlurm CLI
//!
//! Syncs simulator bundles, runs FireSim simulations on the local FPGA host,
//! and submits them to Slurm.

mod args;
mod commands;
mod config;
mod picker;

use anyhow::Result;
use clap::{ArgAction, Parser};
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fireslurm")]
#[command(about = "Run FireSim simulations on FPGA hosts and through Slurm", long_about = None)]
struct Cli {
    /// Log more; repeat for more detail. Also passed on to Slurm
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log host and scheduler commands instead of running them
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Default log filter for a verbosity level
fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "fireslurm=info",
        1 => "fireslurm=debug",
        _ => "fireslurm=trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the console transcript owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.verbose, cli.dry_run)?;

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from([
            "fireslurm",
            "-vv",
            "--dry-run",
            "jobs",
            "cancel",
            "4242",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_batch_command_parses() {
        let cli = Cli::try_parse_from([
            "fireslurm",
            "batch",
            "--run-name",
            "boot",
            "--sim-config",
            "/configs/unified",
            "--sim-img",
            "/images/rootfs.img",
            "--sim-prog",
            "/images/fw_payload.elf",
            "--no-exclusive",
            "--",
            "echo hi",
        ])
        .unwrap();

        match cli.command {
            Commands::Batch { run, job } => {
                assert_eq!(run.command, vec!["echo hi"]);
                assert!(job.no_exclusive);
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_verbosity_filters() {
        assert_eq!(default_filter(0), "fireslurm=info");
        assert_eq!(default_filter(3), "fireslurm=trace");
    }
}
