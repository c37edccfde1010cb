//! Run specification domain types
//!
//! A [`RunSpec`] is the single value describing one simulation execution.
//! It is consumed by the run executor on the simulation host, and the batch
//! submitter serialises it back into `direct-run` arguments so both paths
//! share one definition.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Slurm partition for FireSim hosts
pub const DEFAULT_PARTITION: &str = "firesim";

/// Print start value meaning "never start printing"
pub const PRINT_DISABLED: i64 = -1;

/// Where a run may be placed by the cluster scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Comma-delimited partition list, passed through to Slurm
    pub partition: String,
    /// Comma-delimited host list/range, passed through to Slurm
    pub nodelist: Option<String>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            nodelist: None,
        }
    }
}

/// Instruction trace selection for the simulator's tracer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSpec {
    /// Trigger selector (0 = none, 1 = cycle, 2 = instruction count, 3 = PC)
    pub select: u8,
    /// Start trigger value, hex without prefix
    pub start: String,
    /// End trigger value, hex without prefix
    pub end: String,
    /// Output format (0 = human readable, 1 = binary, 2 = flamegraph)
    pub output_format: u8,
}

impl Default for TraceSpec {
    fn default() -> Self {
        Self {
            select: 3,
            start: "ffffffff00008013".to_string(),
            end: "ffffffff00010013".to_string(),
            output_format: 0,
        }
    }
}

/// Complete description of one simulation execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Name of this run; prefixes the log directory and names the batch job
    pub run_name: String,
    /// Resolved bundle directory holding driver, bitstream and libraries
    pub bundle: PathBuf,
    /// Root block device image
    pub disk_image: PathBuf,
    /// Optional second block device image
    pub aux_image: Option<PathBuf>,
    /// Top-level program (combined OpenSBI firmware and kernel)
    pub program: PathBuf,
    /// Directory merged onto the disk image before execution
    pub overlay: Option<PathBuf>,
    /// Root under which run log directories are created
    pub log_root: PathBuf,
    /// Command fragments to run inside the guest; empty means interactive
    #[serde(default)]
    pub command: Vec<String>,
    /// Where results are collected for batch runs
    pub results_dir: Option<PathBuf>,
    /// Clock cycle at which core trace printing starts
    #[serde(default = "default_print_start")]
    pub print_start: i64,
    /// Instruction trace capture
    pub trace: Option<TraceSpec>,
    /// Scheduler placement
    #[serde(default)]
    pub placement: Placement,
}

impl RunSpec {
    /// True when no command is given and the operator gets the console
    pub fn is_interactive(&self) -> bool {
        self.command_line().is_none()
    }

    /// True when results are collected into a results directory
    pub fn is_batch(&self) -> bool {
        self.results_dir.is_some()
    }

    /// The command as a single guest shell line, if any
    ///
    /// Each fragment is its own guest command; they run in order,
    /// separated by `;`.
    pub fn command_line(&self) -> Option<String> {
        let line = self
            .command
            .iter()
            .map(|fragment| fragment.trim())
            .filter(|fragment| !fragment.is_empty())
            .collect::<Vec<_>>()
            .join(" ; ");

        if line.is_empty() { None } else { Some(line) }
    }

    /// Serialises this spec into `direct-run` arguments
    ///
    /// Parsing the returned arguments with the CLI yields an equal spec.
    /// The guest command comes last, after `--`.
    pub fn to_direct_run_args(&self) -> Vec<String> {
        let mut args = vec![
            "direct-run".to_string(),
            "--run-name".to_string(),
            self.run_name.clone(),
            "--sim-config".to_string(),
            path_arg(&self.bundle),
            "--sim-img".to_string(),
            path_arg(&self.disk_image),
            "--sim-prog".to_string(),
            path_arg(&self.program),
            "--log-dir".to_string(),
            path_arg(&self.log_root),
            "--print-start".to_string(),
            self.print_start.to_string(),
            "--partition".to_string(),
            self.placement.partition.clone(),
        ];

        if let Some(nodelist) = &self.placement.nodelist {
            args.push("--nodelist".to_string());
            args.push(nodelist.clone());
        }
        if let Some(aux) = &self.aux_image {
            args.push("--aux-img".to_string());
            args.push(path_arg(aux));
        }
        if let Some(overlay) = &self.overlay {
            args.push("--overlay-path".to_string());
            args.push(path_arg(overlay));
        }
        if let Some(results) = &self.results_dir {
            args.push("--results-dir".to_string());
            args.push(path_arg(results));
        }
        if let Some(trace) = &self.trace {
            args.extend([
                "--trace".to_string(),
                "--trace-select".to_string(),
                trace.select.to_string(),
                "--trace-start".to_string(),
                trace.start.clone(),
                "--trace-end".to_string(),
                trace.end.clone(),
                "--trace-output-format".to_string(),
                trace.output_format.to_string(),
            ]);
        }

        if !self.command.is_empty() {
            args.push("--".to_string());
            args.extend(self.command.iter().cloned());
        }

        args
    }
}

fn default_print_start() -> i64 {
    PRINT_DISABLED
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RunSpec {
        RunSpec {
            run_name: "boot".to_string(),
            bundle: PathBuf::from("/configs/unified-2025-03-09"),
            disk_image: PathBuf::from("/images/rootfs.img"),
            aux_image: None,
            program: PathBuf::from("/images/fw_payload.elf"),
            overlay: Some(PathBuf::from("/overlay")),
            log_root: PathBuf::from("/logs"),
            command: vec![],
            results_dir: None,
            print_start: PRINT_DISABLED,
            trace: None,
            placement: Placement::default(),
        }
    }

    #[test]
    fn test_interactive_without_command() {
        let mut spec = spec();
        assert!(spec.is_interactive());

        spec.command = vec!["   ".to_string()];
        assert!(spec.is_interactive());

        spec.command = vec!["echo hi".to_string()];
        assert!(!spec.is_interactive());
        assert_eq!(spec.command_line().as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_command_fragments_are_separate_guest_commands() {
        let mut spec = spec();
        spec.command = vec![
            "cd /root".to_string(),
            "  ".to_string(),
            "./bench".to_string(),
        ];
        assert_eq!(spec.command_line().as_deref(), Some("cd /root ; ./bench"));
    }

    #[test]
    fn test_batch_mode_follows_results_dir() {
        let mut spec = spec();
        assert!(!spec.is_batch());
        spec.results_dir = Some(PathBuf::from("/results"));
        assert!(spec.is_batch());
    }

    #[test]
    fn test_direct_run_args_put_command_last() {
        let mut spec = spec();
        spec.command = vec!["cd /root && ./bench".to_string()];
        spec.trace = Some(TraceSpec::default());
        spec.placement.nodelist = Some("pepperjack".to_string());

        let args = spec.to_direct_run_args();
        assert_eq!(args[0], "direct-run");
        let dashdash = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(&args[dashdash + 1..], &["cd /root && ./bench".to_string()]);
        assert!(args.contains(&"--trace".to_string()));
        assert!(args.contains(&"pepperjack".to_string()));
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let json = r#"{
            "run_name": "boot",
            "bundle": "/configs/unified-2025-03-09",
            "disk_image": "/images/rootfs.img",
            "program": "/images/fw_payload.elf",
            "log_root": "/logs"
        }"#;

        let parsed: RunSpec = serde_json::from_str(json).unwrap();
        assert!(parsed.is_interactive());
        assert_eq!(parsed.print_start, PRINT_DISABLED);
        assert_eq!(parsed.placement, Placement::default());
        assert_eq!(parsed.overlay, None);
    }

    #[test]
    fn test_direct_run_args_without_command_have_no_separator() {
        let args = spec().to_direct_run_args();
        assert!(!args.contains(&"--".to_string()));
        assert!(!args.contains(&"--results-dir".to_string()));
    }
}
