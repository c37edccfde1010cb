//! Run log directories
//!
//! Every run gets a fresh directory `<log-root>/<run name>-<timestamp>`,
//! with `<log-root>/latest` repointed at it as soon as it exists.

use chrono::{DateTime, Local};
use fireslurm_core::domain::log::{
    LATEST_ALIAS, OUTCOME_FILE, RECORD_FILE, RunOutcome, RunRecord, TRANSCRIPT_FILE, TRIGGER_FILE,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::alias::replace_symlink;
use crate::error::RunError;

/// A run's log directory
#[derive(Debug, Clone)]
pub struct RunLogDir {
    root: PathBuf,
    path: PathBuf,
}

impl RunLogDir {
    /// Creates a new, never previously used log directory
    ///
    /// Runs started within the same second get a `-N` suffix.
    pub fn create(log_root: &Path, run_name: &str, now: DateTime<Local>) -> Result<Self, RunError> {
        std::fs::create_dir_all(log_root).map_err(|e| RunError::io(log_root, e))?;

        let base = format!("{}-{}", run_name, now.format("%Y-%m-%d-%H%M%S"));
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            let path = log_root.join(&name);

            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!("Created log directory {}", path.display());
                    return Ok(Self {
                        root: log_root.to_path_buf(),
                        path,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(RunError::io(&path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn transcript(&self) -> PathBuf {
        self.path.join(TRANSCRIPT_FILE)
    }

    pub fn trigger(&self) -> PathBuf {
        self.path.join(TRIGGER_FILE)
    }

    pub fn mountpoint(&self) -> PathBuf {
        self.path.join("mountpoint")
    }

    /// Repoints `<log-root>/latest` at this directory
    pub fn mark_latest(&self) -> Result<(), RunError> {
        let link = self.root.join(LATEST_ALIAS);
        replace_symlink(&link, Path::new(&self.name())).map_err(|e| RunError::io(&link, e))
    }

    pub fn write_record(&self, record: &RunRecord) -> Result<(), RunError> {
        self.write_json(RECORD_FILE, record)
    }

    pub fn write_outcome(&self, outcome: &RunOutcome) -> Result<(), RunError> {
        self.write_json(OUTCOME_FILE, outcome)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<(), RunError> {
        let path = self.path.join(file);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| RunError::io(&path, io::Error::other(e)))?;
        std::fs::write(&path, json).map_err(|e| RunError::io(&path, e))
    }
}

/// Name of this host, for provenance records
pub fn host_name() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for its full length
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_same_second_runs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = RunLogDir::create(root.path(), "boot", at()).unwrap();
        let second = RunLogDir::create(root.path(), "boot", at()).unwrap();

        assert_eq!(first.name(), "boot-2025-03-09-140507");
        assert_eq!(second.name(), "boot-2025-03-09-140507-1");
    }

    #[test]
    fn test_mark_latest_follows_newest() {
        let root = tempfile::tempdir().unwrap();
        let first = RunLogDir::create(root.path(), "a", at()).unwrap();
        first.mark_latest().unwrap();
        let second = RunLogDir::create(root.path(), "b", at()).unwrap();
        second.mark_latest().unwrap();

        let latest = std::fs::read_link(root.path().join("latest")).unwrap();
        assert_eq!(latest, PathBuf::from(second.name()));
    }

    #[test]
    fn test_host_name_is_not_empty() {
        assert!(!host_name().is_empty());
    }
}
