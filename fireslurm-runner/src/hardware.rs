//! FPGA programming and the critical sections around it
//!
//! An interrupted flash can leave the FPGA half-programmed, so flashing and
//! the disk image merge run with SIGINT ignored ([`InterruptGuard`]). A
//! second executor on the same disk image is refused by [`ImageLock`].

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::error::RunError;
use crate::shell::{HostCommand, HostShell};

/// Serialises tests that touch the process-wide SIGINT disposition
#[cfg(test)]
pub(crate) static SIGINT_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Ignores SIGINT until dropped, then restores the previous disposition
pub struct InterruptGuard {
    previous: libc::sigaction,
}

impl InterruptGuard {
    pub fn suppress() -> io::Result<Self> {
        // SAFETY: both sigaction structs are fully initialised before use
        unsafe {
            let mut ignore: libc::sigaction = std::mem::zeroed();
            ignore.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut ignore.sa_mask);

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGINT, &ignore, &mut previous) != 0 {
                return Err(io::Error::last_os_error());
            }

            debug!("SIGINT suppressed");
            Ok(Self { previous })
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        // SAFETY: restores the disposition saved in suppress()
        unsafe {
            libc::sigaction(libc::SIGINT, &self.previous, std::ptr::null_mut());
        }
        debug!("SIGINT restored");
    }
}

/// Exclusive advisory lock on a disk image, held for a whole run
#[derive(Debug)]
pub struct ImageLock {
    _file: File,
    path: PathBuf,
}

impl ImageLock {
    /// Locks `<image>.lock`, failing with `ImageBusy` if another run holds it
    pub fn acquire(image: &Path) -> Result<Self, RunError> {
        let mut lock_name = image.as_os_str().to_os_string();
        lock_name.push(".lock");
        let path = PathBuf::from(lock_name);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| RunError::io(&path, e))?;

        // SAFETY: the descriptor is owned by `file` for the lock's lifetime
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(RunError::ImageBusy {
                    image: image.to_path_buf(),
                });
            }
            return Err(RunError::io(&path, err));
        }

        debug!("Locked {}", path.display());
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Programs the bundle's bitstream and opens the device to the simulator
pub async fn flash_fpga(
    shell: &dyn HostShell,
    config: &HostConfig,
    bundle: &Path,
) -> Result<(), RunError> {
    let bitstream = config.bitstream_path(bundle);

    info!("Flashing FPGA with {}", bitstream.display());
    let flash = HostCommand::new(&config.flash_tool)
        .args(config.flash_args.iter().cloned())
        .arg(bitstream.to_string_lossy())
        .privileged(config.use_sudo);
    let output = shell.run(&flash).await?;
    if !output.success() {
        return Err(RunError::Flash {
            detail: output.describe(),
        });
    }

    info!("Configuring PCIe permissions for {}", config.pcie_device);
    let perms = HostCommand::new(&config.pcie_perms_tool)
        .arg(&config.pcie_device)
        .privileged(config.use_sudo);
    let output = shell.run(&perms).await?;
    if !output.success() {
        return Err(RunError::Permissions {
            detail: output.describe(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_on_same_image_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("rootfs.img");
        std::fs::write(&image, b"").unwrap();

        let held = ImageLock::acquire(&image).unwrap();
        assert!(held.path().ends_with("rootfs.img.lock"));
        assert!(matches!(
            ImageLock::acquire(&image),
            Err(RunError::ImageBusy { .. })
        ));

        drop(held);
        assert!(ImageLock::acquire(&image).is_ok());
    }

    #[test]
    fn test_interrupt_guard_restores_disposition() {
        let _serial = SIGINT_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let current = || unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            libc::sigaction(libc::SIGINT, std::ptr::null(), &mut action);
            action.sa_sigaction
        };

        let before = current();
        {
            let _guard = InterruptGuard::suppress().unwrap();
            assert_eq!(current(), libc::SIG_IGN);
        }
        assert_eq!(current(), before);
    }
}
