//! FireSlurm Core
//!
//! Core types and abstractions shared by every FireSlurm crate.
//!
//! This crate contains:
//! - Domain types: artifact bundles, run specifications, run logs and cluster jobs
//! - Naming rules for identifiers that end up in filesystem paths

pub mod domain;
pub mod naming;
