//! Bundle listing

use anyhow::Result;
use colored::*;
use std::path::Path;

use fireslurm_runner::ArtifactStore;

/// Lists every bundle under `config_dir`, newest first
pub fn list_bundles(config_dir: &Path, json: bool) -> Result<()> {
    let bundles = ArtifactStore::new(config_dir).list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bundles)?);
        return Ok(());
    }

    if bundles.is_empty() {
        println!("{}", "No bundles found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} bundle(s):", bundles.len()).bold());
    println!();
    for bundle in bundles {
        let marker = if bundle.is_latest {
            format!(" -> {}", bundle.name).green().to_string()
        } else {
            String::new()
        };
        println!("  {}{}", bundle.dir_name().cyan(), marker);
        if !bundle.description.is_empty() {
            println!("    {}", bundle.description.dimmed());
        }
    }

    Ok(())
}
