//! Disk image staging
//!
//! The overlay directory and the trigger script are copied into the root
//! disk image through a loop mount. The copy is additive: files in the image
//! that the overlay does not carry are left alone.

use std::path::Path;
use tracing::{info, warn};

use crate::config::HostConfig;
use crate::error::RunError;
use crate::shell::{HostCommand, HostShell};

/// Guest path the trigger script is installed at
pub const GUEST_TRIGGER_PATH: &str = "firesim.sh";

/// Mounts `image`, merges the overlay and trigger script into it, unmounts
///
/// The unmount is attempted whenever the mount succeeded, including after a
/// failed copy.
pub async fn merge_into_image(
    shell: &dyn HostShell,
    config: &HostConfig,
    image: &Path,
    overlay: Option<&Path>,
    trigger: &Path,
    mountpoint: &Path,
) -> Result<(), RunError> {
    std::fs::create_dir_all(mountpoint).map_err(|e| RunError::io(mountpoint, e))?;

    info!("Mounting {} on {}", image.display(), mountpoint.display());
    let mount = HostCommand::new("mount")
        .args(["-o", "loop"])
        .arg(image.to_string_lossy())
        .arg(mountpoint.to_string_lossy())
        .privileged(config.use_sudo);
    let output = shell.run(&mount).await?;
    if !output.success() {
        remove_mountpoint(mountpoint);
        return Err(RunError::Mount {
            image: image.to_path_buf(),
            detail: output.describe(),
        });
    }

    let merged = copy_into(shell, config, overlay, trigger, mountpoint).await;

    let umount = HostCommand::new("umount")
        .arg(mountpoint.to_string_lossy())
        .privileged(config.use_sudo);
    let unmounted = shell.run(&umount).await;

    merged?;
    let output = unmounted?;
    if !output.success() {
        return Err(RunError::Mount {
            image: image.to_path_buf(),
            detail: format!("unmount failed: {}", output.describe()),
        });
    }

    remove_mountpoint(mountpoint);
    Ok(())
}

async fn copy_into(
    shell: &dyn HostShell,
    config: &HostConfig,
    overlay: Option<&Path>,
    trigger: &Path,
    mountpoint: &Path,
) -> Result<(), RunError> {
    if let Some(overlay) = overlay {
        info!("Merging overlay {}", overlay.display());
        let copy = HostCommand::new("cp")
            .arg("-a")
            .arg(format!("{}/.", overlay.display()))
            .arg(format!("{}/", mountpoint.display()))
            .privileged(config.use_sudo);
        let output = shell.run(&copy).await?;
        if !output.success() {
            return Err(RunError::Overlay {
                detail: output.describe(),
            });
        }
    }

    let install = HostCommand::new("cp")
        .arg("-a")
        .arg(trigger.to_string_lossy())
        .arg(mountpoint.join(GUEST_TRIGGER_PATH).to_string_lossy())
        .privileged(config.use_sudo);
    let output = shell.run(&install).await?;
    if !output.success() {
        return Err(RunError::Overlay {
            detail: format!("installing trigger script: {}", output.describe()),
        });
    }

    let output = shell.run(&HostCommand::new("sync")).await?;
    if !output.success() {
        warn!("sync exited non-zero: {}", output.describe());
    }

    Ok(())
}

fn remove_mountpoint(mountpoint: &Path) {
    if let Err(e) = std::fs::remove_dir(mountpoint) {
        warn!("Failed to remove {}: {}", mountpoint.display(), e);
    }
}
