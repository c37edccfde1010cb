//! Interactive bundle selection

use anyhow::{Result, bail};
use console::Term;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use fireslurm_core::domain::bundle::ArtifactBundle;
use fireslurm_runner::ArtifactStore;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Menu label for a bundle
fn label(bundle: &ArtifactBundle) -> String {
    let latest = if bundle.is_latest { " (latest)" } else { "" };
    if bundle.description.is_empty() {
        format!("{}{}", bundle.dir_name(), latest)
    } else {
        format!("{}{} - {}", bundle.dir_name(), latest, bundle.description)
    }
}

/// Asks the operator to choose one of the bundles under `config_dir`
pub fn pick_bundle(config_dir: &Path) -> Result<PathBuf> {
    let bundles = ArtifactStore::new(config_dir).list()?;
    if bundles.is_empty() {
        bail!("No bundles in {}; run `fireslurm sync` first", config_dir.display());
    }
    if !std::io::stdin().is_terminal() {
        bail!("--sim-config is required when not running on a terminal");
    }

    let items: Vec<String> = bundles.iter().map(label).collect();
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Simulation config")
        .items(&items)
        .default(0)
        .interact_on_opt(&Term::stderr())?;

    match choice {
        Some(index) => Ok(bundles[index].path.clone()),
        None => bail!("No simulation config selected"),
    }
}
