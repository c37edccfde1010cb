//! Artifact store
//!
//! Holds synced simulator bundles under a configuration root:
//!
//! ```text
//! <root>/unified-2025-03-09/       driver, libraries, platform files
//! <root>/unified-2025-03-09.1/     second sync on the same day
//! <root>/unified -> unified-2025-03-09.1
//! ```
//!
//! Bundles are unpacked into a hidden staging directory and only renamed
//! into place once complete. The name alias moves last.

use chrono::{Local, NaiveDate};
use fireslurm_core::domain::bundle::{
    ARCHIVE_SUFFIXES, ArtifactBundle, BITSTREAM_ARCHIVE, DESCRIPTION_FILE, DRIVER_ARCHIVE,
    bundle_dir_name, parse_bundle_dir_name,
};
use fireslurm_core::naming::validate_name;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::alias::{read_alias, replace_symlink};
use crate::error::SyncError;

/// Attempts to find a free same-day suffix before giving up
const MAX_PUBLISH_ATTEMPTS: u32 = 64;

/// Versioned bundle storage rooted at a configuration directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Syncs the build output in `source` as a new bundle dated today
    pub fn sync(
        &self,
        name: &str,
        description: &str,
        source: &Path,
    ) -> Result<ArtifactBundle, SyncError> {
        self.sync_on(name, description, source, Local::now().date_naive())
    }

    /// Syncs the build output in `source` as a new bundle dated `date`
    ///
    /// The alias `<root>/<name>` is only replaced after the bundle directory
    /// is complete. On any earlier failure the staging directory is removed
    /// and the previous alias stays as it was.
    pub fn sync_on(
        &self,
        name: &str,
        description: &str,
        source: &Path,
        date: NaiveDate,
    ) -> Result<ArtifactBundle, SyncError> {
        validate_name(name)?;
        if parse_bundle_dir_name(name).is_some() {
            return Err(SyncError::DatedName {
                name: name.to_string(),
            });
        }
        if description.trim().is_empty() {
            return Err(SyncError::EmptyDescription);
        }

        let alias = self.root.join(name);
        if let Ok(meta) = std::fs::symlink_metadata(&alias) {
            if !meta.file_type().is_symlink() {
                return Err(SyncError::AliasOccupied { path: alias });
            }
        }

        let archives = [
            find_archive(source, DRIVER_ARCHIVE)?,
            find_archive(source, BITSTREAM_ARCHIVE)?,
        ];

        std::fs::create_dir_all(&self.root).map_err(|e| SyncError::io(&self.root, e))?;

        let staging = self.root.join(format!(
            ".{}-{}.staging-{}",
            name,
            date.format("%Y-%m-%d"),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir(&staging).map_err(|e| SyncError::io(&staging, e))?;
        debug!("Staging bundle in {}", staging.display());

        let published = self
            .stage(&staging, &archives, description)
            .and_then(|_| self.publish(&staging, name, date));

        let bundle_dir = match published {
            Ok(dir) => dir,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!(
                        "Failed to remove staging directory {}: {}",
                        staging.display(),
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        let dir_name = bundle_dir
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| bundle_dir.clone());
        replace_symlink(&alias, &dir_name).map_err(|e| SyncError::io(&alias, e))?;

        info!(
            "Synced bundle {} -> {}",
            alias.display(),
            bundle_dir.display()
        );

        Ok(ArtifactBundle {
            name: name.to_string(),
            created: date,
            path: bundle_dir,
            description: description.to_string(),
            is_latest: true,
        })
    }

    fn stage(&self, staging: &Path, archives: &[PathBuf], description: &str) -> Result<(), SyncError> {
        for archive in archives {
            info!("Extracting {}", archive.display());
            extract_archive(archive, staging)?;
        }

        let description_path = staging.join(DESCRIPTION_FILE);
        std::fs::write(&description_path, description)
            .map_err(|e| SyncError::io(&description_path, e))
    }

    /// Renames the staging directory to the first free `<name>-<date>[.N]`
    fn publish(&self, staging: &Path, name: &str, date: NaiveDate) -> Result<PathBuf, SyncError> {
        let mut sequence = self.next_sequence(name, date)?;

        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let target = self.root.join(bundle_dir_name(name, date, sequence));
            if target.symlink_metadata().is_ok() {
                sequence += 1;
                continue;
            }

            match std::fs::rename(staging, &target) {
                Ok(()) => return Ok(target),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty
                    ) =>
                {
                    debug!("{} appeared concurrently, trying next suffix", target.display());
                    sequence += 1;
                }
                Err(e) => return Err(SyncError::io(&target, e)),
            }
        }

        Err(SyncError::io(
            &self.root,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("no free bundle directory for {} on {}", name, date),
            ),
        ))
    }

    fn next_sequence(&self, name: &str, date: NaiveDate) -> Result<u32, SyncError> {
        let existing = self
            .scan()?
            .into_iter()
            .filter(|(_, n, d, _)| n == name && *d == date)
            .map(|(_, _, _, seq)| seq)
            .max();

        Ok(existing.map(|seq| seq + 1).unwrap_or(0))
    }

    /// Published bundle directories as `(dir name, name, date, sequence)`
    fn scan(&self) -> Result<Vec<(String, String, NaiveDate, u32)>, SyncError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::io(&self.root, e)),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io(&self.root, e))?;
            let file_type = entry.file_type().map_err(|e| SyncError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if let Some((name, date, seq)) = parse_bundle_dir_name(&dir_name) {
                found.push((dir_name, name, date, seq));
            }
        }

        Ok(found)
    }

    /// Lists every published bundle, newest first
    pub fn list(&self) -> Result<Vec<ArtifactBundle>, SyncError> {
        let mut scanned = self.scan()?;
        scanned.sort_by(|a, b| (b.2, b.3, &a.1).cmp(&(a.2, a.3, &b.1)));

        let mut bundles = Vec::with_capacity(scanned.len());
        for (dir_name, name, date, _) in scanned {
            let alias = read_alias(&self.root.join(&name)).map_err(|e| SyncError::io(&self.root, e))?;
            let is_latest = alias
                .as_deref()
                .and_then(Path::file_name)
                .is_some_and(|target| target.to_string_lossy() == dir_name);

            let path = self.root.join(&dir_name);
            bundles.push(ArtifactBundle {
                description: read_description(&path),
                name,
                created: date,
                path,
                is_latest,
            });
        }

        Ok(bundles)
    }

    /// Follows the alias for `name` to its current bundle
    pub fn resolve(&self, name: &str) -> Result<ArtifactBundle, SyncError> {
        validate_name(name)?;
        let alias = self.root.join(name);
        let target = read_alias(&alias)
            .map_err(|e| SyncError::io(&alias, e))?
            .ok_or_else(|| SyncError::UnknownBundle {
                name: name.to_string(),
                root: self.root.clone(),
            })?;

        let path = if target.is_absolute() {
            target
        } else {
            self.root.join(target)
        };
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let created = parse_bundle_dir_name(&dir_name)
            .map(|(_, date, _)| date)
            .unwrap_or_else(|| Local::now().date_naive());

        Ok(ArtifactBundle {
            name: name.to_string(),
            created,
            description: read_description(&path),
            path,
            is_latest: true,
        })
    }
}

/// Reads a bundle's description, empty if it has none
pub fn read_description(bundle: &Path) -> String {
    std::fs::read_to_string(bundle.join(DESCRIPTION_FILE))
        .map(|d| d.trim_end().to_string())
        .unwrap_or_default()
}

/// Finds the archive named `preferred` in `source`, also accepting the
/// same stem with any other supported suffix
fn find_archive(source: &Path, preferred: &str) -> Result<PathBuf, SyncError> {
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| preferred.strip_suffix(suffix))
        .unwrap_or(preferred);

    std::iter::once(source.join(preferred))
        .chain(
            ARCHIVE_SUFFIXES
                .iter()
                .map(|suffix| source.join(format!("{}{}", stem, suffix))),
        )
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| SyncError::MissingArtifact {
            path: source.join(preferred),
        })
}

/// Unpacks a tarball into `dest`, preserving file modes
///
/// Gzip compression is detected from the `.tar.gz`/`.tgz` suffix; `.tar`
/// is read as is.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), SyncError> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::open(archive).map_err(|e| SyncError::io(archive, e))?;
    let reader: Box<dyn Read> = if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        Box::new(GzDecoder::new(file))
    } else if file_name.ends_with(".tar") {
        Box::new(file)
    } else {
        return Err(SyncError::UnsupportedArchive {
            path: archive.to_path_buf(),
        });
    };

    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|source| SyncError::Extraction {
        archive: archive.to_path_buf(),
        source,
    })
}
