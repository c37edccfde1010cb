//! Simulation host configuration
//!
//! Names of the host tools and bundle files the executor relies on. The
//! defaults match a Xilinx VCU118 FireSim host; every value can be
//! overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Simulation host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Simulator driver binary name inside a bundle
    pub driver_binary: String,

    /// Platform directory inside a bundle holding the bitstream
    pub platform_dir: String,

    /// Bitstream file name inside the platform directory
    pub bitstream_file: String,

    /// FPGA flashing tool
    pub flash_tool: String,

    /// Arguments passed to the flashing tool before the bitstream path
    pub flash_args: Vec<String>,

    /// Tool granting user access to the FPGA's PCIe device
    pub pcie_perms_tool: String,

    /// PCIe device address handed to the permission tool
    pub pcie_device: String,

    /// Pause after staging before leaving the critical section
    pub settle_delay: Duration,

    /// Run hardware and mount commands through `sudo`
    pub use_sudo: bool,

    /// Autocounter read rate in cycles
    pub autocounter_readrate: u64,

    /// Wrapper forcing line-buffered driver stdio (`stdbuf`); the console
    /// is read through pipes, not a terminal
    pub line_buffer_tool: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            driver_binary: "FireSim-xilinx_vcu118".to_string(),
            platform_dir: "xilinx_vcu118".to_string(),
            bitstream_file: "firesim.bit".to_string(),
            flash_tool: "firesim-xvsecctl-flash-fpga".to_string(),
            flash_args: vec!["0x01".to_string(), "0x00".to_string(), "0x1".to_string()],
            pcie_perms_tool: "firesim-change-pcie-perms".to_string(),
            pcie_device: "0000:01:00:0".to_string(),
            settle_delay: Duration::from_secs(1),
            use_sudo: true,
            autocounter_readrate: 100_000_000,
            line_buffer_tool: Some("stdbuf".to_string()),
        }
    }
}

impl HostConfig {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional and falls back to the default:
    /// - FIRESLURM_DRIVER
    /// - FIRESLURM_PLATFORM_DIR
    /// - FIRESLURM_BITSTREAM
    /// - FIRESLURM_FLASH_TOOL
    /// - FIRESLURM_PCIE_PERMS_TOOL
    /// - FIRESLURM_PCIE_DEVICE
    /// - FIRESLURM_SETTLE_SECS (seconds)
    /// - FIRESLURM_NO_SUDO (any value disables sudo)
    /// - FIRESLURM_AUTOCOUNTER_READRATE (cycles)
    /// - FIRESLURM_STDBUF (empty disables the line-buffering wrapper)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(driver) = std::env::var("FIRESLURM_DRIVER") {
            config.driver_binary = driver;
        }
        if let Ok(platform) = std::env::var("FIRESLURM_PLATFORM_DIR") {
            config.platform_dir = platform;
        }
        if let Ok(bitstream) = std::env::var("FIRESLURM_BITSTREAM") {
            config.bitstream_file = bitstream;
        }
        if let Ok(tool) = std::env::var("FIRESLURM_FLASH_TOOL") {
            config.flash_tool = tool;
        }
        if let Ok(tool) = std::env::var("FIRESLURM_PCIE_PERMS_TOOL") {
            config.pcie_perms_tool = tool;
        }
        if let Ok(device) = std::env::var("FIRESLURM_PCIE_DEVICE") {
            config.pcie_device = device;
        }

        if let Ok(secs) = std::env::var("FIRESLURM_SETTLE_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("FIRESLURM_SETTLE_SECS must be a number, got '{}'", secs))?;
            config.settle_delay = Duration::from_secs(secs);
        }

        config.use_sudo = std::env::var_os("FIRESLURM_NO_SUDO").is_none();

        if let Ok(rate) = std::env::var("FIRESLURM_AUTOCOUNTER_READRATE") {
            config.autocounter_readrate = rate.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("FIRESLURM_AUTOCOUNTER_READRATE must be a number, got '{}'", rate)
            })?;
        }

        if let Ok(tool) = std::env::var("FIRESLURM_STDBUF") {
            config.line_buffer_tool = (!tool.is_empty()).then_some(tool);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.driver_binary.is_empty() {
            anyhow::bail!("driver_binary cannot be empty");
        }

        if self.platform_dir.is_empty() || self.platform_dir.contains("..") {
            anyhow::bail!("platform_dir must be a relative directory inside the bundle");
        }

        if self.bitstream_file.is_empty() {
            anyhow::bail!("bitstream_file cannot be empty");
        }

        if self.flash_tool.is_empty() || self.pcie_perms_tool.is_empty() {
            anyhow::bail!("hardware tools cannot be empty");
        }

        if self.autocounter_readrate == 0 {
            anyhow::bail!("autocounter_readrate must be greater than 0");
        }

        Ok(())
    }

    /// Simulator driver inside `bundle`
    pub fn driver_path(&self, bundle: &Path) -> PathBuf {
        bundle.join(&self.driver_binary)
    }

    /// Bitstream inside `bundle`
    pub fn bitstream_path(&self, bundle: &Path) -> PathBuf {
        bundle.join(&self.platform_dir).join(&self.bitstream_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.flash_args, vec!["0x01", "0x00", "0x1"]);
        assert!(config.use_sudo);
        assert_eq!(config.line_buffer_tool.as_deref(), Some("stdbuf"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = HostConfig::default();

        config.platform_dir = "../elsewhere".to_string();
        assert!(config.validate().is_err());

        config.platform_dir = "xilinx_vcu118".to_string();
        config.autocounter_readrate = 0;
        assert!(config.validate().is_err());

        config.autocounter_readrate = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundle_paths() {
        let config = HostConfig::default();
        let bundle = Path::new("/configs/unified-2025-03-09");
        assert_eq!(
            config.driver_path(bundle),
            PathBuf::from("/configs/unified-2025-03-09/FireSim-xilinx_vcu118")
        );
        assert_eq!(
            config.bitstream_path(bundle),
            PathBuf::from("/configs/unified-2025-03-09/xilinx_vcu118/firesim.bit")
        );
    }
}
