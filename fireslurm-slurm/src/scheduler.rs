//! Slurm command plumbing
//!
//! The [`Scheduler`] trait is the seam between the submitter and the
//! cluster. [`SlurmScheduler`] drives the real `sbatch`/`srun`/`squeue`/
//! `scancel` binaries; argument building and output parsing are plain
//! functions so they can be tested without a cluster.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use fireslurm_core::domain::job::{ClusterJob, JobId, JobState};
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SlurmConfig;
use crate::error::{Result, SchedulerError};

static SUBMITTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Submitted batch job (\d+)\s*$").expect("static pattern"));

static TEST_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Job (\d+) to start at").expect("static pattern"));

/// `squeue` output format: id, name, state, partition, nodes, submit time
pub const SQUEUE_FORMAT: &str = "%i|%j|%T|%P|%N|%V";

/// One `sbatch` submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbatchRequest {
    pub job_name: String,
    pub partition: String,
    pub nodelist: Option<String>,
    /// stdout path template, `%j` is replaced by the job id
    pub output: PathBuf,
    /// stderr path template
    pub error: PathBuf,
    pub exclusive: bool,
    pub verbosity: u8,
    /// Ask Slurm to validate and estimate without queueing
    pub test_only: bool,
    pub script: PathBuf,
}

/// One interactive `srun --pty` session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrunRequest {
    pub job_name: String,
    pub partition: String,
    pub nodelist: Option<String>,
    pub exclusive: bool,
    pub command: Vec<String>,
}

/// Builds `sbatch` arguments; the script is always last
pub fn sbatch_args(req: &SbatchRequest) -> Vec<String> {
    let mut args = vec!["--partition".to_string(), req.partition.clone()];
    if let Some(nodelist) = &req.nodelist {
        args.push("--nodelist".to_string());
        args.push(nodelist.clone());
    }
    args.extend([
        "--job-name".to_string(),
        req.job_name.clone(),
        "--output".to_string(),
        req.output.to_string_lossy().into_owned(),
        "--error".to_string(),
        req.error.to_string_lossy().into_owned(),
    ]);
    if req.exclusive {
        args.push("--exclusive".to_string());
    }
    args.extend(crate::script::verbosity_flag(req.verbosity));
    if req.test_only {
        args.push("--test-only".to_string());
    }
    args.push(req.script.to_string_lossy().into_owned());
    args
}

/// Builds `srun` arguments; the command follows `--pty`
pub fn srun_args(req: &SrunRequest) -> Vec<String> {
    let mut args = vec!["--partition".to_string(), req.partition.clone()];
    if let Some(nodelist) = &req.nodelist {
        args.push("--nodelist".to_string());
        args.push(nodelist.clone());
    }
    args.push("--job-name".to_string());
    args.push(req.job_name.clone());
    if req.exclusive {
        args.push("--exclusive".to_string());
    }
    args.push("--pty".to_string());
    args.extend(req.command.iter().cloned());
    args
}

/// Extracts the job id from `sbatch` output
///
/// Returns the id and whether it came from a `--test-only` estimate.
pub fn parse_submission(stdout: &str, stderr: &str) -> Option<(JobId, bool)> {
    if let Some(caps) = SUBMITTED.captures(stdout) {
        return caps[1].parse().ok().map(|id| (id, false));
    }
    // sbatch --test-only reports on stderr
    TEST_ONLY
        .captures(stderr)
        .or_else(|| TEST_ONLY.captures(stdout))
        .and_then(|caps| caps[1].parse().ok())
        .map(|id| (id, true))
}

/// Parses `squeue --noheader --format` output in [`SQUEUE_FORMAT`]
pub fn parse_squeue(output: &str) -> Vec<ClusterJob> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().splitn(6, '|').collect();
            if fields.len() < 3 {
                return None;
            }
            let optional = |i: usize| {
                fields
                    .get(i)
                    .map(|f| f.trim())
                    .filter(|f| !f.is_empty() && *f != "(null)" && *f != "N/A")
                    .map(str::to_string)
            };

            Some(ClusterJob {
                id: fields[0].parse().ok()?,
                name: fields[1].trim().to_string(),
                state: JobState::from_slurm(fields[2]),
                partition: optional(3),
                nodes: optional(4),
                submitted_at: optional(5)
                    .and_then(|t| NaiveDateTime::parse_from_str(&t, "%Y-%m-%dT%H:%M:%S").ok()),
                output: None,
            })
        })
        .collect()
}

/// Cluster scheduler operations FireSlurm relies on
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Queues a batch job
    async fn submit(&self, req: &SbatchRequest) -> Result<ClusterJob>;

    /// Runs a command in an allocation attached to this terminal,
    /// returning its exit code
    async fn run_interactive(&self, req: &SrunRequest) -> Result<i32>;

    /// Lists queued and running jobs, optionally for one user
    async fn list_jobs(&self, user: Option<&str>) -> Result<Vec<ClusterJob>>;

    /// Cancels a job
    async fn cancel(&self, id: JobId) -> Result<()>;
}

/// Scheduler backed by the Slurm command line tools
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    config: SlurmConfig,
}

impl SlurmScheduler {
    pub fn new(config: SlurmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SlurmConfig {
        &self.config
    }

    /// Runs a Slurm tool and returns its stdout and stderr, failing with
    /// the tool's own message on a non-zero exit
    async fn capture(&self, program: &str, args: &[String]) -> Result<(String, String)> {
        let shown = format!("{} {}", program, args.join(" "));
        debug!("Running: {}", shown);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| SchedulerError::Spawn {
                command: program.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!("{} stdout: {}", program, stdout.trim());
        debug!("{} stderr: {}", program, stderr.trim());

        if !output.status.success() {
            return Err(SchedulerError::Rejected {
                command: shown,
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok((stdout, stderr))
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    async fn submit(&self, req: &SbatchRequest) -> Result<ClusterJob> {
        let args = sbatch_args(req);
        let (stdout, stderr) = self.capture(&self.config.sbatch, &args).await?;

        let (id, test_only) =
            parse_submission(&stdout, &stderr).ok_or_else(|| SchedulerError::UnexpectedOutput {
                command: self.config.sbatch.clone(),
                output: format!("{}{}", stdout, stderr).trim().to_string(),
            })?;

        info!("Submitted job {} ({})", id, req.job_name);
        Ok(ClusterJob {
            id,
            name: req.job_name.clone(),
            state: if test_only {
                JobState::TestOnly
            } else {
                JobState::Pending
            },
            partition: Some(req.partition.clone()),
            nodes: req.nodelist.clone(),
            submitted_at: Some(Local::now().naive_local()),
            output: Some(req.output.clone()),
        })
    }

    async fn run_interactive(&self, req: &SrunRequest) -> Result<i32> {
        let args = srun_args(req);
        info!("Running: {} {}", self.config.srun, args.join(" "));

        let status = Command::new(&self.config.srun)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| SchedulerError::Spawn {
                command: self.config.srun.clone(),
                source,
            })?;

        Ok(status.code().unwrap_or(-1))
    }

    async fn list_jobs(&self, user: Option<&str>) -> Result<Vec<ClusterJob>> {
        let mut args = vec![
            "--noheader".to_string(),
            "--format".to_string(),
            SQUEUE_FORMAT.to_string(),
        ];
        if let Some(user) = user {
            args.push("--user".to_string());
            args.push(user.to_string());
        }

        let (stdout, _) = self.capture(&self.config.squeue, &args).await?;
        Ok(parse_squeue(&stdout))
    }

    async fn cancel(&self, id: JobId) -> Result<()> {
        self.capture(&self.config.scancel, &[id.to_string()]).await?;
        info!("Cancelled job {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SbatchRequest {
        SbatchRequest {
            job_name: "fireslurm-boot".to_string(),
            partition: "firesim".to_string(),
            nodelist: Some("pepperjack".to_string()),
            output: PathBuf::from("/results/slurm-log/%j.out"),
            error: PathBuf::from("/results/slurm-log/%j.err"),
            exclusive: true,
            verbosity: 1,
            test_only: true,
            script: PathBuf::from("/results/run-fireslurm-boot.sh"),
        }
    }

    #[test]
    fn test_sbatch_args_end_with_script() {
        let args = sbatch_args(&request());
        assert_eq!(
            args,
            vec![
                "--partition",
                "firesim",
                "--nodelist",
                "pepperjack",
                "--job-name",
                "fireslurm-boot",
                "--output",
                "/results/slurm-log/%j.out",
                "--error",
                "/results/slurm-log/%j.err",
                "--exclusive",
                "-v",
                "--test-only",
                "/results/run-fireslurm-boot.sh",
            ]
        );
    }

    #[test]
    fn test_sbatch_args_minimal() {
        let mut req = request();
        req.nodelist = None;
        req.exclusive = false;
        req.verbosity = 0;
        req.test_only = false;

        let args = sbatch_args(&req);
        assert!(!args.contains(&"--nodelist".to_string()));
        assert!(!args.contains(&"--exclusive".to_string()));
        assert_eq!(args.len(), 9);
    }

    #[test]
    fn test_srun_args_put_command_after_pty() {
        let args = srun_args(&SrunRequest {
            job_name: "fireslurm-boot".to_string(),
            partition: "firesim".to_string(),
            nodelist: None,
            exclusive: true,
            command: vec!["/bin/fireslurm".to_string(), "direct-run".to_string()],
        });
        let pty = args.iter().position(|a| a == "--pty").unwrap();
        assert_eq!(&args[pty + 1..], &["/bin/fireslurm", "direct-run"]);
    }

    #[test]
    fn test_parse_submission() {
        assert_eq!(
            parse_submission("Submitted batch job 4242\n", ""),
            Some((JobId(4242), false))
        );
        assert_eq!(
            parse_submission(
                "",
                "sbatch: Job 4243 to start at 2025-03-09T14:05:07 using 1 processors on nodes pepperjack in partition firesim\n"
            ),
            Some((JobId(4243), true))
        );
        assert_eq!(parse_submission("sbatch: error: invalid partition", ""), None);
    }

    #[test]
    fn test_parse_squeue() {
        let output = "4242|fireslurm-boot|RUNNING|firesim|pepperjack|2025-03-09T14:05:07\n\
                      4243|fireslurm-bench-1|PENDING|firesim||2025-03-09T14:06:00\n\
                      \n\
                      garbage\n";
        let jobs = parse_squeue(output);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, JobId(4242));
        assert_eq!(jobs[0].state, JobState::Running);
        assert_eq!(jobs[0].nodes.as_deref(), Some("pepperjack"));
        assert!(jobs[0].submitted_at.is_some());
        assert_eq!(jobs[1].state, JobState::Pending);
        assert_eq!(jobs[1].nodes, None);
    }

    fn scheduler_with_scancel(scancel: &str) -> SlurmScheduler {
        SlurmScheduler::new(SlurmConfig {
            scancel: scancel.to_string(),
            ..SlurmConfig::default()
        })
    }

    #[tokio::test]
    async fn test_cancel_reports_tool_failure_verbatim() {
        let err = scheduler_with_scancel("false")
            .cancel(JobId(4242))
            .await
            .unwrap_err();

        assert!(err.is_rejection());
        match err {
            SchedulerError::Rejected {
                command, status, ..
            } => {
                assert_eq!(command, "false 4242");
                assert_eq!(status, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_succeeds_on_zero_exit() {
        scheduler_with_scancel("true").cancel(JobId(4242)).await.unwrap();
    }
}
