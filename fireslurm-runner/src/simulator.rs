//! Simulator invocation
//!
//! Builds the driver command line for one run and remaps the terminal's
//! interrupt key while the simulator owns the console.

use fireslurm_core::domain::log::{AUTOCOUNTER_BASE, BLKDEV_LOG_FILE, TRACE_BASE};
use fireslurm_core::domain::run::RunSpec;
use std::io::IsTerminal;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::config::HostConfig;
use crate::shell::HostCommand;

/// NIC, PCI and assertion parameters the driver requires on every run,
/// even when the NIC is unused
const FIXED_PLUSARGS: &[&str] = &[
    "+macaddr0=00:12:6D:00:00:02",
    "+niclog0=niclog0",
    "+linklatency0=6405",
    "+netbw0=200",
    "+shmemportname0=default",
    "+domain=0x0000",
    "+bus=0x01",
    "+device=0x00",
    "+function=0x0",
    "+bar=0x0",
    "+pci-vendor=0x10ee",
    "+pci-device=0x903f",
    "+disable-asserts",
];

/// Builds the simulator command for `spec`, writing outputs into `log_dir`
///
/// With a line-buffer tool configured the driver runs as
/// `stdbuf -oL -eL <driver>`, so console output reaches the transcript as
/// each line is printed.
pub fn build_command(config: &HostConfig, spec: &RunSpec, log_dir: &Path) -> HostCommand {
    let mut library_path = spec.bundle.display().to_string();
    if let Ok(existing) = std::env::var("LD_LIBRARY_PATH") {
        if !existing.is_empty() {
            library_path = format!("{}:{}", library_path, existing);
        }
    }

    let program = spec.program.display();
    let driver = config.driver_path(&spec.bundle).to_string_lossy().into_owned();
    let launcher = match &config.line_buffer_tool {
        Some(tool) => HostCommand::new(tool).args(["-oL", "-eL"]).arg(driver),
        None => HostCommand::new(driver),
    };

    let mut command = launcher
        .env("LD_LIBRARY_PATH", library_path)
        .privileged(config.use_sudo)
        .arg("+permissive")
        .arg(format!("+blkdev0={}", spec.disk_image.display()));

    if let Some(aux) = &spec.aux_image {
        command = command.arg(format!("+blkdev1={}", aux.display()));
    }

    // +permissive-off must be directly followed by the program
    command = command
        .arg(format!(
            "+blkdev-log0={}",
            log_dir.join(BLKDEV_LOG_FILE).display()
        ))
        .arg("+permissive-off")
        .arg(format!("+prog0={}", program))
        .arg(format!("+dwarf-file-name={}-dwarf", program));

    if let Some(trace) = &spec.trace {
        command = command.args([
            format!("+tracefile={}", log_dir.join(TRACE_BASE).display()),
            format!("+trace-select={}", trace.select),
            format!("+trace-start={}", trace.start),
            format!("+trace-end={}", trace.end),
            format!("+trace-output-format={}", trace.output_format),
        ]);
    }

    command
        .arg(format!(
            "+autocounter-readrate={}",
            config.autocounter_readrate
        ))
        .arg(format!(
            "+autocounter-filename-base={}",
            log_dir.join(AUTOCOUNTER_BASE).display()
        ))
        .arg(format!("+print-start={}", spec.print_start))
        .arg("+print-end=-1")
        .args(FIXED_PLUSARGS.iter().copied())
}

/// Moves the terminal's interrupt key to `^]` so `^C` reaches the guest
///
/// Restores `^C` when dropped. Does nothing when stdin is not a terminal.
pub struct InterruptKeyRemap {
    engaged: bool,
}

impl InterruptKeyRemap {
    pub fn engage(enabled: bool) -> Self {
        if !enabled || !std::io::stdin().is_terminal() {
            return Self { engaged: false };
        }

        let engaged = set_interrupt_key("^]");
        if engaged {
            debug!("Interrupt key remapped to ^]");
        }
        Self { engaged }
    }
}

impl Drop for InterruptKeyRemap {
    fn drop(&mut self) {
        if self.engaged {
            set_interrupt_key("^c");
        }
    }
}

fn set_interrupt_key(key: &str) -> bool {
    match Command::new("stty").args(["intr", key]).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!("stty intr {} exited with {}", key, status);
            false
        }
        Err(e) => {
            warn!("Failed to run stty: {}", e);
            false
        }
    }
}
