//! Scheduler configuration

use std::path::PathBuf;

/// Slurm client binaries and the executable batch jobs re-invoke
#[derive(Debug, Clone)]
pub struct SlurmConfig {
    pub sbatch: String,
    pub srun: String,
    pub squeue: String,
    pub scancel: String,
    /// FireSlurm binary run by jobs on the worker node
    pub fireslurm_bin: PathBuf,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            srun: "srun".to_string(),
            squeue: "squeue".to_string(),
            scancel: "scancel".to_string(),
            fireslurm_bin: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("fireslurm")),
        }
    }
}

impl SlurmConfig {
    /// Creates configuration from environment variables
    ///
    /// Optional environment variables:
    /// - FIRESLURM_BIN (default: the running executable)
    /// - FIRESLURM_SBATCH, FIRESLURM_SRUN, FIRESLURM_SQUEUE, FIRESLURM_SCANCEL
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(bin) = std::env::var_os("FIRESLURM_BIN") {
            config.fireslurm_bin = PathBuf::from(bin);
        }
        for (var, slot) in [
            ("FIRESLURM_SBATCH", &mut config.sbatch),
            ("FIRESLURM_SRUN", &mut config.srun),
            ("FIRESLURM_SQUEUE", &mut config.squeue),
            ("FIRESLURM_SCANCEL", &mut config.scancel),
        ] {
            if let Ok(value) = std::env::var(var) {
                *slot = value;
            }
        }

        config
    }
}
