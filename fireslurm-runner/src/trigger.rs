//! Guest trigger script
//!
//! The guest's init runs `/firesim.sh` once it has booted. The script
//! brackets the workload with the start/end trigger markers the host-side
//! simulator watches for, then powers the guest off so the simulator exits.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Script body for an interactive session
pub const NOOP_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

/// Renders the trigger script for an optional guest command line
pub fn render(command: Option<&str>) -> String {
    match command {
        None => NOOP_SCRIPT.to_string(),
        Some(command) => format!(
            "#!/bin/sh\n\
             echo 0 > /proc/sys/kernel/randomize_va_space\n\
             firesim-start-trigger; {}; firesim-end-trigger; poweroff -f\n",
            command
        ),
    }
}

/// Writes the trigger script to `path` as an executable file
pub fn write(path: &Path, command: Option<&str>) -> std::io::Result<()> {
    std::fs::write(path, render(command))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o774))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_script_is_noop() {
        assert_eq!(render(None), "#!/bin/sh\nexit 0\n");
    }

    #[test]
    fn test_command_is_bracketed_by_triggers() {
        let script = render(Some("echo hi"));
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("echo 0 > /proc/sys/kernel/randomize_va_space\n"));
        assert!(script.ends_with(
            "firesim-start-trigger; echo hi; firesim-end-trigger; poweroff -f\n"
        ));
    }

    #[test]
    fn test_write_marks_script_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firesim.sh");
        write(&path, Some("true")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o774);
    }
}
