//! Run executor
//!
//! Takes one [`RunSpec`] from inputs to a finished run log on the local
//! simulation host:
//!
//! 1. Configuring: validate inputs, lock the disk image, create the log
//!    directory, record the resolved configuration
//! 2. Preparing hardware: render the trigger script, flash the FPGA
//! 3. Staging: merge overlay and trigger script into the disk image
//! 4. Executing: run the simulator on the console until the guest powers off
//! 5. Post-processing: trace histogram, outcome record, batch results
//!
//! Steps 2 and 3 run with SIGINT suppressed. Every invocation starts from
//! scratch in a fresh log directory, so re-running the same spec is safe.

use chrono::{Local, Utc};
use fireslurm_core::domain::log::{RunOutcome, RunRecord, RunStatus};
use fireslurm_core::domain::run::RunSpec;
use fireslurm_core::naming::validate_name;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::RunError;
use crate::hardware::{ImageLock, InterruptGuard, flash_fpga};
use crate::logdir::{RunLogDir, host_name};
use crate::overlay::merge_into_image;
use crate::shell::{ConsoleExit, HostShell};
use crate::simulator::{InterruptKeyRemap, build_command};
use crate::store::read_description;
use crate::{results, trace, trigger};

/// What a completed run left behind
#[derive(Debug, Clone)]
pub struct RunReport {
    pub log_dir: PathBuf,
    pub outcome: RunOutcome,
}

/// Executes runs against the local FPGA
pub struct RunExecutor {
    config: HostConfig,
    shell: Arc<dyn HostShell>,
}

impl RunExecutor {
    pub fn new(config: HostConfig, shell: Arc<dyn HostShell>) -> Self {
        Self { config, shell }
    }

    /// Checks every input before any side effect
    pub fn validate(&self, spec: &RunSpec) -> Result<(), RunError> {
        validate_name(&spec.run_name)?;

        let invalid_bundle = |reason: &str| RunError::InvalidBundle {
            path: spec.bundle.clone(),
            reason: reason.to_string(),
        };
        if !spec.bundle.is_dir() {
            return Err(invalid_bundle("not a directory"));
        }
        let driver = self.config.driver_path(&spec.bundle);
        let executable = std::fs::metadata(&driver)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            return Err(invalid_bundle(&format!(
                "missing executable driver {}",
                self.config.driver_binary
            )));
        }
        if !self.config.bitstream_path(&spec.bundle).is_file() {
            return Err(invalid_bundle(&format!(
                "missing bitstream {}/{}",
                self.config.platform_dir, self.config.bitstream_file
            )));
        }

        if let Some(overlay) = &spec.overlay {
            if !overlay.is_dir() {
                return Err(RunError::InvalidInput(format!(
                    "overlay {} is not a directory",
                    overlay.display()
                )));
            }
        }

        let is_image = spec.disk_image.extension().is_some_and(|ext| ext == "img");
        if !is_image || !spec.disk_image.is_file() {
            return Err(RunError::InvalidInput(format!(
                "disk image {} must be an existing .img file",
                spec.disk_image.display()
            )));
        }
        if let Some(aux) = &spec.aux_image {
            require_file(aux, "auxiliary image")?;
        }
        require_file(&spec.program, "program")?;

        Ok(())
    }

    /// Runs `spec` to completion
    ///
    /// A simulator that exits non-zero is reported through the outcome, not
    /// as an error. Staging and hardware errors abort the run and leave the
    /// partial log directory without an outcome record.
    pub async fn execute(&self, spec: &RunSpec) -> Result<RunReport, RunError> {
        self.validate(spec)?;
        let dry_run = self.shell.dry_run();

        let _image_lock = ImageLock::acquire(&spec.disk_image)?;

        // Configuring
        let started = Instant::now();
        let log_dir = RunLogDir::create(&spec.log_root, &spec.run_name, Local::now())?;
        log_dir.mark_latest()?;
        info!("Logging run '{}' to {}", spec.run_name, log_dir.path().display());

        let description = read_description(&spec.bundle);
        let record = RunRecord {
            run_id: Uuid::new_v4(),
            host: host_name(),
            started_at: Utc::now(),
            bundle: spec.bundle.clone(),
            bundle_description: (!description.is_empty()).then_some(description),
            dry_run,
            spec: spec.clone(),
        };
        log_dir.write_record(&record)?;

        // Preparing hardware
        let command_line = spec.command_line();
        match &command_line {
            Some(command) => info!("Guest command: {}", command),
            None => warn!("No command given, the simulation will be interactive"),
        }
        let trigger_path = log_dir.trigger();
        trigger::write(&trigger_path, command_line.as_deref())
            .map_err(|e| RunError::io(&trigger_path, e))?;

        {
            let _interrupts = InterruptGuard::suppress().map_err(|e| RunError::io(log_dir.path(), e))?;

            flash_fpga(self.shell.as_ref(), &self.config, &spec.bundle).await?;

            // Staging
            merge_into_image(
                self.shell.as_ref(),
                &self.config,
                &spec.disk_image,
                spec.overlay.as_deref(),
                &trigger_path,
                &log_dir.mountpoint(),
            )
            .await?;

            if !dry_run && !self.config.settle_delay.is_zero() {
                info!("Waiting {:?} for the hardware to settle", self.config.settle_delay);
                tokio::time::sleep(self.config.settle_delay).await;
            }
        }
        info!("Finished hardware setup");

        // Executing
        let simulator = build_command(&self.config, spec, log_dir.path());
        let exit = {
            let _remap = InterruptKeyRemap::engage(!dry_run);
            self.shell
                .run_console(&simulator, &log_dir.transcript())
                .await?
        };

        let (status, exit_code) = match exit {
            _ if dry_run => (RunStatus::DryRun, None),
            ConsoleExit::Exited(0) => (RunStatus::Succeeded, Some(0)),
            ConsoleExit::Exited(code) => {
                warn!(
                    "Simulator exited with code {}; see {}",
                    code,
                    log_dir.transcript().display()
                );
                (RunStatus::GuestFailed, Some(code))
            }
            ConsoleExit::Interrupted => {
                warn!("Run '{}' was interrupted", spec.run_name);
                (RunStatus::Cancelled, None)
            }
        };

        // Post-processing
        let trace_histogram = if dry_run {
            None
        } else {
            trace::post_process(log_dir.path())
        };

        let outcome = RunOutcome {
            run_id: record.run_id,
            status,
            exit_code,
            finished_at: Utc::now(),
            wall_time_secs: started.elapsed().as_secs_f64(),
            trace_histogram,
            results: spec
                .results_dir
                .as_deref()
                .map(|dir| results::destination(dir, log_dir.path())),
        };
        log_dir.write_outcome(&outcome)?;

        if let Some(results_dir) = &spec.results_dir {
            results::collect(log_dir.path(), results_dir, &record, &outcome)?;
        }

        info!(
            "Run '{}' finished: {} in {:.1}s",
            spec.run_name, outcome.status, outcome.wall_time_secs
        );
        debug!("Outcome: {:?}", outcome);

        Ok(RunReport {
            log_dir: log_dir.path().to_path_buf(),
            outcome,
        })
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), RunError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RunError::InvalidInput(format!(
            "{} {} is not a readable file",
            what,
            path.display()
        )))
    }
}
