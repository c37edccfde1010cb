//! Error types for the simulation host
//!
//! Sync failures and run failures are kept apart: a failed sync never
//! touches a bundle alias, and a failed run always leaves its partial log
//! directory behind for diagnosis.

use fireslurm_core::naming::NameError;
use std::path::PathBuf;
use thiserror::Error;

use crate::shell::ShellError;

/// Errors raised while synchronising an artifact bundle
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bundle name is not a safe path component
    #[error("Invalid bundle name: {0}")]
    InvalidName(#[from] NameError),

    /// Name would be mistaken for a dated bundle directory
    #[error("Bundle name '{name}' ends in a date; pick the name without it")]
    DatedName { name: String },

    /// `<root>/<name>` exists and is not an alias
    #[error("{} exists and is not a bundle alias", path.display())]
    AliasOccupied { path: PathBuf },

    /// Description was empty or whitespace
    #[error("Bundle description must not be empty")]
    EmptyDescription,

    /// An expected build archive is absent from the source directory
    #[error("Missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Archive suffix is not one we know how to unpack
    #[error("Unsupported archive format: {}", path.display())]
    UnsupportedArchive { path: PathBuf },

    /// Unpacking failed part-way
    #[error("Failed to extract {}: {source}", archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No alias exists for the requested name
    #[error("No bundle named '{name}' in {}", root.display())]
    UnknownBundle { name: String, root: PathBuf },

    /// Filesystem error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broad failure classes of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any side effect
    Input,
    /// Log directory, mount or overlay failure
    Staging,
    /// Bitstream flash or device permission failure; never retried
    Hardware,
    /// Simulator could not be launched at all
    Launch,
}

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum RunError {
    /// Malformed run specification
    #[error("Invalid run input: {0}")]
    InvalidInput(String),

    /// Run name is not a safe path component
    #[error("Invalid run name: {0}")]
    InvalidName(#[from] NameError),

    /// Bundle directory does not have the expected layout
    #[error("Invalid bundle {}: {reason}", path.display())]
    InvalidBundle { path: PathBuf, reason: String },

    /// Another executor holds the disk image
    #[error("Disk image {} is in use by another run", image.display())]
    ImageBusy { image: PathBuf },

    /// Mounting or unmounting the disk image failed
    #[error("Failed to mount {}: {detail}", image.display())]
    Mount { image: PathBuf, detail: String },

    /// Copying the overlay into the mounted image failed
    #[error("Failed to merge overlay: {detail}")]
    Overlay { detail: String },

    /// Flashing the bitstream failed
    #[error("Failed to flash FPGA: {detail}")]
    Flash { detail: String },

    /// Configuring device permissions failed
    #[error("Failed to configure FPGA permissions: {detail}")]
    Permissions { detail: String },

    /// A host command could not be started
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Filesystem error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Creates an I/O error tagged with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classifies this error
    pub fn kind(&self) -> FailureKind {
        match self {
            RunError::InvalidInput(_)
            | RunError::InvalidName(_)
            | RunError::InvalidBundle { .. }
            | RunError::ImageBusy { .. } => FailureKind::Input,
            RunError::Mount { .. } | RunError::Overlay { .. } | RunError::Io { .. } => {
                FailureKind::Staging
            }
            RunError::Flash { .. } | RunError::Permissions { .. } => FailureKind::Hardware,
            RunError::Shell(_) => FailureKind::Launch,
        }
    }
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_errors_are_classified() {
        let err = RunError::Flash {
            detail: "exit 1".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::Hardware);
        assert!(err.to_string().contains("flash"));
    }

    #[test]
    fn test_input_errors_are_classified() {
        let err = RunError::ImageBusy {
            image: PathBuf::from("/images/rootfs.img"),
        };
        assert_eq!(err.kind(), FailureKind::Input);
        assert!(err.to_string().contains("rootfs.img"));
    }
}
