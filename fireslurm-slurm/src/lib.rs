//! FireSlurm cluster scheduling
//!
//! Submits runs to Slurm as batch jobs that re-invoke the executor on a
//! worker node, runs them interactively through `srun`, and lists or
//! cancels queued jobs.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fireslurm_slurm::{BatchSubmitter, SchedulingHints, SlurmConfig, SlurmScheduler};
//! # async fn example(spec: fireslurm_core::domain::run::RunSpec) -> fireslurm_slurm::Result<()> {
//! let config = SlurmConfig::from_env();
//! let submitter = BatchSubmitter::new(Arc::new(SlurmScheduler::new(config.clone())), config);
//! let job = submitter.submit(&spec, &SchedulingHints::default()).await?;
//! println!("Submitted job {}", job.id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod script;
pub mod submitter;
pub mod sweep;

pub use config::SlurmConfig;
pub use error::{Result, SchedulerError};
pub use scheduler::{Scheduler, SlurmScheduler};
pub use submitter::{BatchSubmitter, SchedulingHints, SweepSubmission};
pub use sweep::SweepSpec;
