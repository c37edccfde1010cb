//! Artifact bundle domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the metadata file holding a bundle's human description
pub const DESCRIPTION_FILE: &str = "description.txt";

/// Archive holding the simulator driver and its libraries
pub const DRIVER_ARCHIVE: &str = "driver-bundle.tar.gz";

/// Archive holding the bitstream and platform files
pub const BITSTREAM_ARCHIVE: &str = "firesim.tar.gz";

/// Archive suffixes a sync accepts, in lookup order
pub const ARCHIVE_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".tar"];

/// One synchronized, immutable snapshot of simulator build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// Logical configuration name (the alias name)
    pub name: String,
    /// Day the bundle was synced
    pub created: NaiveDate,
    /// Bundle directory
    pub path: PathBuf,
    /// Contents of the description file
    pub description: String,
    /// Whether the name alias currently points at this bundle
    pub is_latest: bool,
}

impl ArtifactBundle {
    /// Directory name of the bundle (`<name>-<date>[.N]`)
    pub fn dir_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds the directory name for a bundle synced on `date`
///
/// `sequence` 0 is the first sync of the day; later same-day syncs get a
/// `.N` suffix so published bundles never collide.
pub fn bundle_dir_name(name: &str, date: NaiveDate, sequence: u32) -> String {
    let base = format!("{}-{}", name, date.format("%Y-%m-%d"));
    if sequence == 0 {
        base
    } else {
        format!("{}.{}", base, sequence)
    }
}

/// Splits a bundle directory name back into `(name, date, sequence)`
///
/// Returns `None` for directories that do not follow the bundle naming
/// scheme (staging directories, aliases, unrelated files).
pub fn parse_bundle_dir_name(dir_name: &str) -> Option<(String, NaiveDate, u32)> {
    if dir_name.starts_with('.') {
        return None;
    }

    let (stem, sequence) = match dir_name.rsplit_once('.') {
        Some((stem, seq)) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()) => {
            (stem, seq.parse().ok()?)
        }
        _ => (dir_name, 0),
    };

    // "<name>-YYYY-MM-DD": the date is always the last 10 characters
    if stem.len() < 12 || !stem.is_char_boundary(stem.len() - 11) {
        return None;
    }
    let (name, date) = stem.split_at(stem.len() - 11);
    let date = date.strip_prefix('-')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), date, sequence))
}
