//! Sync command handler

use anyhow::Result;
use colored::*;
use std::path::Path;

use fireslurm_runner::ArtifactStore;

use crate::config::Config;

/// Syncs `source` into the store at `config_dir`
pub fn handle_sync(
    config_dir: &Path,
    name: &str,
    description: &str,
    source: &Path,
    config: &Config,
) -> Result<()> {
    if config.dry_run {
        println!(
            "{} would sync {} from {} into {}",
            "[dry-run]".yellow(),
            name.cyan(),
            source.display(),
            config_dir.display()
        );
        return Ok(());
    }

    let store = ArtifactStore::new(config_dir);
    let bundle = store.sync(name, description, source)?;

    println!("{}", "✓ Bundle synced".green().bold());
    println!("  {}: {}", "Bundle".bold(), bundle.path.display());
    println!(
        "  {}: {} -> {}",
        "Alias".bold(),
        config_dir.join(name).display(),
        bundle.dir_name()
    );
    println!("  {}: {}", "Description".bold(), bundle.description);

    Ok(())
}
