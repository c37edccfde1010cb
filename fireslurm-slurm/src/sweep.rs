//! Parameter sweeps
//!
//! A sweep file is JSON naming a base run and the axes to vary:
//!
//! ```json
//! {
//!   "base": { "run_name": "bench", "bundle": "...", ... },
//!   "commands": ["cd /root && ./bench a", "cd /root && ./bench b"],
//!   "disk_images": ["/images/a.img", "/images/b.img"]
//! }
//! ```
//!
//! The cartesian product of all non-empty axes becomes one batch job each,
//! named `<run name>-<index>`. Loading a sweep file pins a bundle alias to
//! the dated bundle it points at, so a later sync cannot change queued jobs.

use fireslurm_core::domain::run::RunSpec;
use fireslurm_core::naming::validate_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SchedulerError};

/// A base run and the values to substitute into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSpec {
    pub base: RunSpec,
    /// Guest command lines
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub programs: Vec<PathBuf>,
    #[serde(default)]
    pub overlays: Vec<PathBuf>,
    #[serde(default)]
    pub disk_images: Vec<PathBuf>,
}

impl SweepSpec {
    /// Loads a sweep file and resolves its paths
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SchedulerError::io(path, e))?;
        let mut sweep = Self::parse(&content)?;
        sweep.resolve_paths()?;
        Ok(sweep)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SchedulerError::InvalidSweep(e.to_string()))
    }

    /// Makes every path absolute and pins the bundle alias
    pub fn resolve_paths(&mut self) -> Result<()> {
        let base = &mut self.base;
        base.bundle = std::fs::canonicalize(&base.bundle).or_else(|_| absolute(&base.bundle))?;
        base.disk_image = absolute(&base.disk_image)?;
        base.program = absolute(&base.program)?;
        base.log_root = absolute(&base.log_root)?;
        if let Some(aux) = &base.aux_image {
            base.aux_image = Some(absolute(aux)?);
        }
        if let Some(overlay) = &base.overlay {
            base.overlay = Some(absolute(overlay)?);
        }
        if let Some(results) = &base.results_dir {
            base.results_dir = Some(absolute(results)?);
        }

        for values in [&mut self.programs, &mut self.overlays, &mut self.disk_images] {
            for path in values.iter_mut() {
                *path = absolute(path)?;
            }
        }

        Ok(())
    }

    /// Expands the sweep into one run per combination
    ///
    /// Every expanded run must carry a command; the sweep is rejected as a
    /// whole otherwise.
    pub fn expand(&self) -> Result<Vec<RunSpec>> {
        validate_name(&self.base.run_name)?;

        let commands: Vec<Vec<String>> = if self.commands.is_empty() {
            vec![self.base.command.clone()]
        } else {
            self.commands.iter().map(|c| vec![c.clone()]).collect()
        };
        let programs = axis(&self.programs, &self.base.program);
        let disk_images = axis(&self.disk_images, &self.base.disk_image);
        let overlays: Vec<Option<PathBuf>> = if self.overlays.is_empty() {
            vec![self.base.overlay.clone()]
        } else {
            self.overlays.iter().cloned().map(Some).collect()
        };

        let mut runs = Vec::new();
        for disk_image in &disk_images {
            for program in &programs {
                for overlay in &overlays {
                    for command in &commands {
                        let index = runs.len();
                        let mut run = self.base.clone();
                        run.run_name = format!("{}-{}", self.base.run_name, index);
                        run.disk_image = disk_image.clone();
                        run.program = program.clone();
                        run.overlay = overlay.clone();
                        run.command = command.clone();

                        if run.is_interactive() {
                            return Err(SchedulerError::InvalidSweep(format!(
                                "run {} has no command",
                                run.run_name
                            )));
                        }
                        runs.push(run);
                    }
                }
            }
        }

        Ok(runs)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| SchedulerError::io(path, e))
}

fn axis(values: &[PathBuf], base: &Path) -> Vec<PathBuf> {
    if values.is_empty() {
        vec![base.to_path_buf()]
    } else {
        values.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWEEP: &str = r#"{
        "base": {
            "run_name": "bench",
            "bundle": "/configs/unified",
            "disk_image": "/images/rootfs.img",
            "aux_image": null,
            "program": "/images/fw_payload.elf",
            "overlay": "/overlay",
            "log_root": "/logs",
            "results_dir": "/results"
        },
        "commands": ["./bench a", "./bench b", "./bench c"],
        "disk_images": ["/images/a.img", "/images/b.img"]
    }"#;

    #[test]
    fn test_expand_is_cartesian_product() {
        let sweep = SweepSpec::parse(SWEEP).unwrap();
        let runs = sweep.expand().unwrap();

        assert_eq!(runs.len(), 6);
        assert_eq!(runs[0].run_name, "bench-0");
        assert_eq!(runs[5].run_name, "bench-5");
        assert_eq!(runs[0].disk_image, PathBuf::from("/images/a.img"));
        assert_eq!(runs[3].disk_image, PathBuf::from("/images/b.img"));
        assert_eq!(runs[4].command, vec!["./bench b".to_string()]);
        assert!(runs.iter().all(|r| r.print_start == -1));
        assert!(runs.iter().all(|r| r.placement.partition == "firesim"));
    }

    #[test]
    fn test_sweep_without_commands_is_rejected() {
        let mut sweep = SweepSpec::parse(SWEEP).unwrap();
        sweep.commands.clear();
        assert!(matches!(sweep.expand(), Err(SchedulerError::InvalidSweep(_))));
    }

    #[test]
    fn test_malformed_sweep_file() {
        assert!(matches!(
            SweepSpec::parse("{\"commands\": []}"),
            Err(SchedulerError::InvalidSweep(_))
        ));
    }

    #[test]
    fn test_load_pins_bundle_alias() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join("unified-2025-03-09")).unwrap();
        std::os::unix::fs::symlink("unified-2025-03-09", root.join("unified")).unwrap();

        let file = root.join("sweep.json");
        let content = SWEEP.replace("/configs/unified", &root.join("unified").to_string_lossy());
        std::fs::write(&file, content).unwrap();

        let runs = SweepSpec::load(&file).unwrap().expand().unwrap();
        assert!(runs.iter().all(|r| r.bundle == root.join("unified-2025-03-09")));
        assert_eq!(runs[0].log_root, PathBuf::from("/logs"));
    }
}
