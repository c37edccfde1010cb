//! Arguments shared by the run, direct-run and batch commands

use anyhow::{Context, Result};
use clap::Args;
use fireslurm_core::domain::run::{
    DEFAULT_PARTITION, PRINT_DISABLED, Placement, RunSpec, TraceSpec,
};
use std::path::{Path, PathBuf};

use crate::picker::pick_bundle;

/// Everything needed to describe one simulation run
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Name of this run; prefixes its log directory
    #[arg(long)]
    pub run_name: String,

    /// Bundle directory or alias (picked interactively if omitted)
    #[arg(long)]
    pub sim_config: Option<PathBuf>,

    /// Directory holding synced bundles, used by the picker
    #[arg(long, env = "FIRESLURM_CONFIG_DIR", default_value = "configs")]
    pub config_dir: PathBuf,

    /// Root disk image (.img)
    #[arg(long)]
    pub sim_img: PathBuf,

    /// Optional second disk image
    #[arg(long)]
    pub aux_img: Option<PathBuf>,

    /// Top-level program (OpenSBI firmware with the kernel)
    #[arg(long)]
    pub sim_prog: PathBuf,

    /// Directory merged onto the disk image before the run
    #[arg(long)]
    pub overlay_path: Option<PathBuf>,

    /// Root for run log directories
    #[arg(long, env = "FIRESLURM_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Collect results here after the run
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Clock cycle to begin emitting trace printing from the core
    #[arg(short, long, default_value_t = PRINT_DISABLED, allow_negative_numbers = true)]
    pub print_start: i64,

    /// Capture an instruction trace
    #[arg(long)]
    pub trace: bool,

    /// Trace trigger selector
    #[arg(long, default_value_t = 3)]
    pub trace_select: u8,

    /// Trace start trigger (hex)
    #[arg(long, default_value = "ffffffff00008013")]
    pub trace_start: String,

    /// Trace end trigger (hex)
    #[arg(long, default_value = "ffffffff00010013")]
    pub trace_end: String,

    /// Trace output format
    #[arg(long, default_value_t = 0)]
    pub trace_output_format: u8,

    /// Slurm partition(s), comma separated
    #[arg(long, env = "FIRESLURM_PARTITION", default_value = DEFAULT_PARTITION)]
    pub partition: String,

    /// Slurm host list or range
    #[arg(long)]
    pub nodelist: Option<String>,

    /// Command to run inside the guest; omit for an interactive console
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Resolves the arguments into a run specification
    ///
    /// Paths are made absolute so the RunSpec means the same thing on a
    /// worker node. An alias given as `--sim-config` is pinned to the
    /// bundle it currently points at.
    pub fn into_spec(self) -> Result<RunSpec> {
        let bundle = match self.sim_config {
            Some(path) => path,
            None => pick_bundle(&self.config_dir)?,
        };
        let bundle = std::fs::canonicalize(&bundle).or_else(|_| absolute(&bundle))?;

        let trace = self.trace.then(|| TraceSpec {
            select: self.trace_select,
            start: self.trace_start,
            end: self.trace_end,
            output_format: self.trace_output_format,
        });

        Ok(RunSpec {
            run_name: self.run_name,
            bundle,
            disk_image: absolute(&self.sim_img)?,
            aux_image: self.aux_img.as_deref().map(absolute).transpose()?,
            program: absolute(&self.sim_prog)?,
            overlay: self.overlay_path.as_deref().map(absolute).transpose()?,
            log_root: absolute(&self.log_dir)?,
            command: self.command,
            results_dir: self.results_dir.as_deref().map(absolute).transpose()?,
            print_start: self.print_start,
            trace,
            placement: Placement {
                partition: self.partition,
                nodelist: self.nodelist,
            },
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Cannot resolve {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: HarnessCommand,
    }

    #[derive(clap::Subcommand)]
    enum HarnessCommand {
        DirectRun(RunArgs),
    }

    fn parse(args: &[String]) -> RunSpec {
        let argv = std::iter::once("fireslurm".to_string()).chain(args.iter().cloned());
        let harness = Harness::try_parse_from(argv).unwrap();
        let HarnessCommand::DirectRun(run) = harness.command;
        run.into_spec().unwrap()
    }

    fn spec(bundle: &Path) -> RunSpec {
        RunSpec {
            run_name: "boot".to_string(),
            bundle: bundle.to_path_buf(),
            disk_image: PathBuf::from("/images/rootfs.img"),
            aux_image: Some(PathBuf::from("/images/data.img")),
            program: PathBuf::from("/images/fw_payload.elf"),
            overlay: Some(PathBuf::from("/overlay")),
            log_root: PathBuf::from("/logs"),
            command: vec!["cd /root && ./bench --fast".to_string()],
            results_dir: Some(PathBuf::from("/results")),
            print_start: -1,
            trace: Some(TraceSpec::default()),
            placement: Placement {
                partition: "firesim,spare".to_string(),
                nodelist: Some("pepperjack".to_string()),
            },
        }
    }

    #[test]
    fn test_direct_run_args_parse_back_to_same_spec() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = std::fs::canonicalize(dir.path()).unwrap();
        let original = spec(&bundle);

        assert_eq!(parse(&original.to_direct_run_args()), original);
    }

    #[test]
    fn test_interactive_spec_parses_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = std::fs::canonicalize(dir.path()).unwrap();
        let mut original = spec(&bundle);
        original.command.clear();
        original.trace = None;
        original.print_start = 1000;

        let parsed = parse(&original.to_direct_run_args());
        assert!(parsed.is_interactive());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_alias_is_pinned_to_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join("unified-2025-03-09")).unwrap();
        std::os::unix::fs::symlink("unified-2025-03-09", root.join("unified")).unwrap();

        let mut original = spec(&root.join("unified"));
        original.command = vec!["true".to_string()];
        let parsed = parse(&original.to_direct_run_args());

        assert_eq!(parsed.bundle, root.join("unified-2025-03-09"));
    }
}
