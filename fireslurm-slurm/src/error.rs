//! Error types for scheduler interaction

use fireslurm_core::naming::NameError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur when talking to Slurm
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Batch jobs cannot be interactive
    #[error("Batch runs need a command to run inside the guest")]
    MissingCommand,

    /// Job or run name is not usable
    #[error("Invalid job name: {0}")]
    InvalidName(#[from] NameError),

    /// Scheduler refused the request; its output is kept verbatim
    #[error("'{command}' failed (exit {status}): {stderr}")]
    Rejected {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Scheduler succeeded but printed something we cannot interpret
    #[error("Unexpected output from {command}: {output}")]
    UnexpectedOutput { command: String, output: String },

    /// Scheduler binary could not be started
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing job scripts or output directories failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sweep file is malformed or expands to nothing runnable
    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),
}

impl SchedulerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the scheduler itself turned the request down
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
