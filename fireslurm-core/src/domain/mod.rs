//! Core domain types
//!
//! This module contains the core domain structures used across FireSlurm.
//! They are shared between the simulation host (which syncs bundles and
//! executes runs) and the submitting side (which serialises runs into
//! scheduler jobs).

pub mod bundle;
pub mod job;
pub mod log;
pub mod run;
