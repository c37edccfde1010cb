//! Run log domain types
//!
//! A run log is a directory owned by the executor that created it. These
//! types describe the JSON records written into it and the fixed file names
//! downstream tooling relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::run::RunSpec;

/// Alias pointing at the most recently started run
pub const LATEST_ALIAS: &str = "latest";
/// Resolved configuration recorded before any hardware step
pub const RECORD_FILE: &str = "run.json";
/// Terminal outcome; absent while a run is in progress or was killed
pub const OUTCOME_FILE: &str = "outcome.json";
/// Console transcript
pub const TRANSCRIPT_FILE: &str = "uartlog";
/// Generated guest trigger script
pub const TRIGGER_FILE: &str = "firesim.sh";
/// Block device log written by the simulator
pub const BLKDEV_LOG_FILE: &str = "blkdev-log0";
/// File base for performance counter dumps
pub const AUTOCOUNTER_BASE: &str = "AUTOCOUNTERFILE";
/// File base for instruction traces
pub const TRACE_BASE: &str = "TRACEFILE";
/// Trace post-processing output
pub const TRACE_HISTOGRAM_FILE: &str = "trace-histogram.csv";
/// Per-run summary written into the results directory
pub const SUMMARY_FILE: &str = "summary.json";

/// Provenance record written when a run log directory is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub bundle: PathBuf,
    pub bundle_description: Option<String>,
    pub dry_run: bool,
    pub spec: RunSpec,
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Simulator exited cleanly
    Succeeded,
    /// Simulator completed but exited non-zero
    GuestFailed,
    /// Operator interrupted the simulator
    Cancelled,
    /// Nothing was executed
    DryRun,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::GuestFailed => write!(f, "GuestFailed"),
            RunStatus::Cancelled => write!(f, "Cancelled"),
            RunStatus::DryRun => write!(f, "DryRun"),
        }
    }
}

/// Outcome record written when a run reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub finished_at: DateTime<Utc>,
    pub wall_time_secs: f64,
    /// Histogram produced from an instruction trace, if any
    pub trace_histogram: Option<PathBuf>,
    /// Where results were collected to, for batch runs
    pub results: Option<PathBuf>,
}

impl RunOutcome {
    /// Whether the run completed in a way downstream tooling can consume
    pub fn is_complete(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::GuestFailed)
    }
}

/// Summary placed next to collected results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_name: String,
    pub run_id: Uuid,
    pub log_dir: PathBuf,
    pub bundle_description: Option<String>,
    pub command: Option<String>,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub host_wall_time_secs: f64,
    pub collected_at: DateTime<Utc>,
}
