//! FireSlurm simulation host
//!
//! Everything that runs on the machine with the FPGA: the artifact store
//! that holds synced bundles, and the executor that stages and runs one
//! simulation.

pub mod alias;
pub mod config;
pub mod error;
pub mod executor;
pub mod hardware;
pub mod logdir;
pub mod overlay;
pub mod results;
pub mod shell;
pub mod simulator;
pub mod store;
pub mod trace;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use config::HostConfig;
pub use error::{FailureKind, RunError, SyncError};
pub use executor::{RunExecutor, RunReport};
pub use shell::{HostShell, SystemShell};
pub use store::ArtifactStore;
