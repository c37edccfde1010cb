//! Cluster job domain types
//!
//! The scheduler owns these jobs; FireSlurm only submits, lists and cancels.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Numeric identifier Slurm assigns to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Scheduler's view of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterJob {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub partition: Option<String>,
    pub nodes: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    /// Output path template given at submission
    pub output: Option<PathBuf>,
}

/// Job state as reported by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Completing,
    Completed,
    Cancelled,
    Failed,
    Timeout,
    /// Accepted by `--test-only`; never actually queued
    TestOnly,
    Other(String),
}

impl JobState {
    /// Maps a Slurm long state name (`%T`) to a job state
    pub fn from_slurm(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "PENDING" => JobState::Pending,
            "RUNNING" => JobState::Running,
            "COMPLETING" => JobState::Completing,
            "COMPLETED" => JobState::Completed,
            // scancel reports "CANCELLED by <uid>"
            s if s.starts_with("CANCELLED") => JobState::Cancelled,
            "FAILED" | "NODE_FAIL" | "OUT_OF_MEMORY" | "BOOT_FAIL" => JobState::Failed,
            "TIMEOUT" | "DEADLINE" => JobState::Timeout,
            other => JobState::Other(other.to_string()),
        }
    }

    /// Whether the scheduler still considers the job live
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Pending | JobState::Running | JobState::Completing
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "Pending"),
            JobState::Running => write!(f, "Running"),
            JobState::Completing => write!(f, "Completing"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Cancelled => write!(f, "Cancelled"),
            JobState::Failed => write!(f, "Failed"),
            JobState::Timeout => write!(f, "Timeout"),
            JobState::TestOnly => write!(f, "TestOnly"),
            JobState::Other(s) => write!(f, "{}", s),
        }
    }
}
