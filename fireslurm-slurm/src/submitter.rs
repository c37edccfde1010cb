//! Batch submitter
//!
//! Turns a [`RunSpec`] into a Slurm job whose body re-invokes
//! `fireslurm direct-run` with the same spec on the worker node. The
//! submitter never executes, polls or retries; job status and cancellation
//! belong to the scheduler.

use fireslurm_core::domain::job::ClusterJob;
use fireslurm_core::domain::run::RunSpec;
use fireslurm_core::naming::validate_name;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SlurmConfig;
use crate::error::{Result, SchedulerError};
use crate::scheduler::{SbatchRequest, Scheduler, SrunRequest};
use crate::script::{invocation, render_job_script};
use crate::sweep::SweepSpec;

/// Directory under the results directory receiving Slurm's stdout/stderr
pub const SLURM_LOG_DIR: &str = "slurm-log";

/// How a run should be placed and labelled by the scheduler
#[derive(Debug, Clone)]
pub struct SchedulingHints {
    /// Defaults to `fireslurm-<run name>`
    pub job_name: Option<String>,
    /// Reserve the whole node
    pub exclusive: bool,
    /// Defaults to `<results dir>/slurm-log/%j.out`
    pub output: Option<PathBuf>,
    /// Defaults to `<results dir>/slurm-log/%j.err`
    pub error: Option<PathBuf>,
    /// Passed on to sbatch and to the re-invoked executor
    pub verbosity: u8,
    /// Submit with `--test-only` and run the executor in dry-run mode
    pub dry_run: bool,
}

impl Default for SchedulingHints {
    fn default() -> Self {
        Self {
            job_name: None,
            exclusive: true,
            output: None,
            error: None,
            verbosity: 0,
            dry_run: false,
        }
    }
}

impl SchedulingHints {
    pub fn job_name_for(&self, spec: &RunSpec) -> String {
        self.job_name
            .clone()
            .unwrap_or_else(|| format!("fireslurm-{}", spec.run_name))
    }

    pub fn output_for(&self, results_dir: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| results_dir.join(SLURM_LOG_DIR).join("%j.out"))
    }

    pub fn error_for(&self, results_dir: &Path) -> PathBuf {
        self.error
            .clone()
            .unwrap_or_else(|| results_dir.join(SLURM_LOG_DIR).join("%j.err"))
    }
}

/// Outcome of one job in a sweep
#[derive(Debug)]
pub struct SweepSubmission {
    pub run_name: String,
    pub result: Result<ClusterJob>,
}

/// Submits runs to the cluster scheduler
pub struct BatchSubmitter {
    scheduler: Arc<dyn Scheduler>,
    config: SlurmConfig,
}

impl BatchSubmitter {
    pub fn new(scheduler: Arc<dyn Scheduler>, config: SlurmConfig) -> Self {
        Self { scheduler, config }
    }

    /// Results directory for a batch run, `<log root>/results` if unset
    pub fn results_dir_for(spec: &RunSpec) -> PathBuf {
        spec.results_dir
            .clone()
            .unwrap_or_else(|| spec.log_root.join("results"))
    }

    /// Arguments the worker node runs for `spec`
    fn direct_run_argv(&self, spec: &RunSpec, hints: &SchedulingHints) -> Vec<String> {
        let mut args = Vec::new();
        if hints.dry_run {
            args.push("--dry-run".to_string());
        }
        args.extend(spec.to_direct_run_args());
        invocation(&self.config.fireslurm_bin, hints.verbosity, &args)
    }

    /// Queues `spec` as one batch job
    ///
    /// Fails with [`SchedulerError::MissingCommand`] before touching the
    /// filesystem when the run has no command.
    pub async fn submit(&self, spec: &RunSpec, hints: &SchedulingHints) -> Result<ClusterJob> {
        if spec.is_interactive() {
            return Err(SchedulerError::MissingCommand);
        }
        validate_name(&spec.run_name)?;
        let job_name = hints.job_name_for(spec);
        validate_name(&job_name)?;

        let results_dir = Self::results_dir_for(spec);
        let mut spec = spec.clone();
        spec.results_dir = Some(results_dir.clone());

        std::fs::create_dir_all(&results_dir)
            .map_err(|e| SchedulerError::io(&results_dir, e))?;

        let script = results_dir.join(format!("run-{}.sh", job_name));
        let content = render_job_script(&job_name, &self.direct_run_argv(&spec, hints));
        std::fs::write(&script, content).map_err(|e| SchedulerError::io(&script, e))?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o775))
            .map_err(|e| SchedulerError::io(&script, e))?;
        info!("Wrote job script {}", script.display());

        let output = hints.output_for(&results_dir);
        let error = hints.error_for(&results_dir);
        // Slurm does not create missing output directories
        for path in [&output, &error] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SchedulerError::io(parent, e))?;
            }
        }

        let request = SbatchRequest {
            job_name,
            partition: spec.placement.partition.clone(),
            nodelist: spec.placement.nodelist.clone(),
            output,
            error,
            exclusive: hints.exclusive,
            verbosity: hints.verbosity,
            test_only: hints.dry_run,
            script,
        };

        let job = self.scheduler.submit(&request).await?;
        info!(
            "Job {} ({}) output will be in {}",
            job.id,
            job.name,
            request.output.display()
        );
        Ok(job)
    }

    /// Submits every run of a sweep, continuing past rejections
    ///
    /// An invalid sweep is rejected before anything is submitted.
    pub async fn submit_sweep(
        &self,
        sweep: &SweepSpec,
        hints: &SchedulingHints,
    ) -> Result<Vec<SweepSubmission>> {
        let runs = sweep.expand()?;
        info!("Submitting {} runs", runs.len());

        let mut submissions = Vec::with_capacity(runs.len());
        for run in runs {
            let run_hints = SchedulingHints {
                job_name: hints
                    .job_name
                    .as_ref()
                    .map(|base| format!("{}-{}", base, submissions.len())),
                ..hints.clone()
            };

            let result = self.submit(&run, &run_hints).await;
            if let Err(e) = &result {
                warn!("Submission of {} failed: {}", run.run_name, e);
            }
            submissions.push(SweepSubmission {
                run_name: run.run_name,
                result,
            });
        }

        Ok(submissions)
    }

    /// Runs `spec` through `srun` attached to this terminal
    ///
    /// Unlike batch submission a command is optional here; without one the
    /// operator gets the guest console.
    pub async fn run_attached(&self, spec: &RunSpec, hints: &SchedulingHints) -> Result<i32> {
        validate_name(&spec.run_name)?;
        let request = SrunRequest {
            job_name: hints.job_name_for(spec),
            partition: spec.placement.partition.clone(),
            nodelist: spec.placement.nodelist.clone(),
            exclusive: hints.exclusive,
            command: self.direct_run_argv(spec, hints),
        };
        self.scheduler.run_interactive(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fireslurm_core::domain::job::{JobId, JobState};
    use fireslurm_core::domain::run::Placement;
    use std::sync::Mutex;

    /// Accepts every submission except one job name
    #[derive(Default)]
    struct FakeScheduler {
        submitted: Mutex<Vec<SbatchRequest>>,
        interactive: Mutex<Vec<SrunRequest>>,
        reject_job: Option<String>,
    }

    #[async_trait]
    impl Scheduler for FakeScheduler {
        async fn submit(&self, req: &SbatchRequest) -> Result<ClusterJob> {
            if self.reject_job.as_deref() == Some(req.job_name.as_str()) {
                return Err(SchedulerError::Rejected {
                    command: "sbatch".to_string(),
                    status: 1,
                    stderr: "sbatch: error: Batch job submission failed: Invalid partition name specified".to_string(),
                });
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(req.clone());
            Ok(ClusterJob {
                id: JobId(1000 + submitted.len() as u64),
                name: req.job_name.clone(),
                state: JobState::Pending,
                partition: Some(req.partition.clone()),
                nodes: None,
                submitted_at: None,
                output: Some(req.output.clone()),
            })
        }

        async fn run_interactive(&self, req: &SrunRequest) -> Result<i32> {
            self.interactive.lock().unwrap().push(req.clone());
            Ok(0)
        }

        async fn list_jobs(&self, _user: Option<&str>) -> Result<Vec<ClusterJob>> {
            Ok(Vec::new())
        }

        async fn cancel(&self, _id: JobId) -> Result<()> {
            Ok(())
        }
    }

    fn spec(results: &Path) -> RunSpec {
        RunSpec {
            run_name: "boot".to_string(),
            bundle: PathBuf::from("/configs/unified-2025-03-09"),
            disk_image: PathBuf::from("/images/rootfs.img"),
            aux_image: None,
            program: PathBuf::from("/images/fw_payload.elf"),
            overlay: Some(PathBuf::from("/overlay")),
            log_root: PathBuf::from("/logs"),
            command: vec!["echo hi".to_string()],
            results_dir: Some(results.to_path_buf()),
            print_start: -1,
            trace: None,
            placement: Placement::default(),
        }
    }

    fn submitter(scheduler: Arc<FakeScheduler>) -> BatchSubmitter {
        let config = SlurmConfig {
            fireslurm_bin: PathBuf::from("/opt/bin/fireslurm"),
            ..SlurmConfig::default()
        };
        BatchSubmitter::new(scheduler, config)
    }

    #[tokio::test]
    async fn test_submit_without_command_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let mut spec = spec(&results);
        spec.command.clear();
        let scheduler = Arc::new(FakeScheduler::default());

        let err = submitter(scheduler.clone())
            .submit(&spec, &SchedulingHints::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::MissingCommand));
        assert!(scheduler.submitted.lock().unwrap().is_empty());
        assert!(!results.exists());
    }

    #[tokio::test]
    async fn test_submit_writes_script_and_returns_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let scheduler = Arc::new(FakeScheduler::default());

        let job = submitter(scheduler.clone())
            .submit(&spec(&results), &SchedulingHints::default())
            .await
            .unwrap();
        assert_eq!(job.id, JobId(1001));
        assert_eq!(job.name, "fireslurm-boot");

        let request = scheduler.submitted.lock().unwrap()[0].clone();
        assert_eq!(request.script, results.join("run-fireslurm-boot.sh"));
        assert_eq!(request.output, results.join("slurm-log/%j.out"));
        assert!(request.exclusive);
        assert!(results.join("slurm-log").is_dir());

        let script = std::fs::read_to_string(&request.script).unwrap();
        assert!(script.contains("exec /opt/bin/fireslurm"));
        assert!(script.contains("direct-run"));
        assert!(script.contains("'echo hi'"));
        let mode = std::fs::metadata(&request.script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o775);
    }

    #[tokio::test]
    async fn test_dry_run_submission_uses_test_only() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Arc::new(FakeScheduler::default());
        let hints = SchedulingHints {
            dry_run: true,
            verbosity: 2,
            ..SchedulingHints::default()
        };

        submitter(scheduler.clone())
            .submit(&spec(dir.path()), &hints)
            .await
            .unwrap();

        let request = scheduler.submitted.lock().unwrap()[0].clone();
        assert!(request.test_only);
        let script = std::fs::read_to_string(&request.script).unwrap();
        assert!(script.contains("-vv \\\n    --dry-run \\\n    direct-run"));
    }

    #[tokio::test]
    async fn test_sweep_continues_past_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Arc::new(FakeScheduler {
            reject_job: Some("fireslurm-boot-1".to_string()),
            ..FakeScheduler::default()
        });
        let sweep = SweepSpec {
            base: spec(dir.path()),
            commands: vec!["./a".to_string(), "./b".to_string(), "./c".to_string()],
            programs: vec![],
            overlays: vec![],
            disk_images: vec![],
        };

        let submissions = submitter(scheduler.clone())
            .submit_sweep(&sweep, &SchedulingHints::default())
            .await
            .unwrap();

        assert_eq!(submissions.len(), 3);
        assert!(submissions[0].result.is_ok());
        assert!(submissions[1].result.as_ref().unwrap_err().is_rejection());
        assert!(submissions[2].result.is_ok());
        assert_eq!(scheduler.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_attached_allows_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = spec(dir.path());
        spec.command.clear();
        let scheduler = Arc::new(FakeScheduler::default());

        let code = submitter(scheduler.clone())
            .run_attached(&spec, &SchedulingHints::default())
            .await
            .unwrap();

        assert_eq!(code, 0);
        let request = scheduler.interactive.lock().unwrap()[0].clone();
        assert_eq!(request.command[0], "/opt/bin/fireslurm");
        assert_eq!(request.command[1], "direct-run");
    }
}
