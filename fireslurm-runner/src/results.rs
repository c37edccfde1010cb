//! Batch result collection
//!
//! Copies the interesting parts of a finished run log into
//! `<results dir>/<log dir name>/` together with a `summary.json`, so
//! results from many cluster jobs land in one place.

use chrono::Utc;
use fireslurm_core::domain::log::{
    AUTOCOUNTER_BASE, OUTCOME_FILE, RECORD_FILE, RunOutcome, RunRecord, RunSummary, SUMMARY_FILE,
    TRANSCRIPT_FILE,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::RunError;

/// Directory a run's results are collected into
pub fn destination(results_dir: &Path, log_dir: &Path) -> PathBuf {
    match log_dir.file_name() {
        Some(name) => results_dir.join(name),
        None => results_dir.to_path_buf(),
    }
}

/// Collects results of the run logged in `log_dir`
pub fn collect(
    log_dir: &Path,
    results_dir: &Path,
    record: &RunRecord,
    outcome: &RunOutcome,
) -> Result<PathBuf, RunError> {
    let dest = destination(results_dir, log_dir);
    std::fs::create_dir_all(&dest).map_err(|e| RunError::io(&dest, e))?;

    let mut files: Vec<PathBuf> = [RECORD_FILE, OUTCOME_FILE, TRANSCRIPT_FILE]
        .iter()
        .map(|name| log_dir.join(name))
        .collect();

    if let Ok(entries) = std::fs::read_dir(log_dir) {
        files.extend(
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(AUTOCOUNTER_BASE))
                .map(|e| e.path()),
        );
    }
    if let Some(histogram) = &outcome.trace_histogram {
        files.push(histogram.clone());
    }

    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        if !file.is_file() {
            debug!("Nothing to collect at {}", file.display());
            continue;
        }
        let target = dest.join(name);
        if let Err(e) = std::fs::copy(&file, &target) {
            warn!("Failed to collect {}: {}", file.display(), e);
        }
    }

    let summary = RunSummary {
        run_name: record.spec.run_name.clone(),
        run_id: record.run_id,
        log_dir: log_dir.to_path_buf(),
        bundle_description: record.bundle_description.clone(),
        command: record.spec.command_line(),
        status: outcome.status,
        exit_code: outcome.exit_code,
        host_wall_time_secs: outcome.wall_time_secs,
        collected_at: Utc::now(),
    };
    let summary_path = dest.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| RunError::io(&summary_path, std::io::Error::other(e)))?;
    std::fs::write(&summary_path, json).map_err(|e| RunError::io(&summary_path, e))?;

    info!("Results collected in {}", dest.display());
    Ok(dest)
}
