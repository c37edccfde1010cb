//! Configuration module
//!
//! Collects the global flags and the environment-driven host and Slurm
//! settings every command works from.

use anyhow::Result;
use fireslurm_runner::HostConfig;
use fireslurm_slurm::SlurmConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of `-v` flags
    pub verbosity: u8,
    /// Log commands instead of running them
    pub dry_run: bool,
    pub host: HostConfig,
    pub slurm: SlurmConfig,
}

impl Config {
    pub fn load(verbosity: u8, dry_run: bool) -> Result<Self> {
        let host = HostConfig::from_env()?;
        host.validate()?;

        Ok(Self {
            verbosity,
            dry_run,
            host,
            slurm: SlurmConfig::from_env(),
        })
    }
}
