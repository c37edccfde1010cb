//! Atomic symbolic aliases
//!
//! Both `<configs>/<name>` and `<logs>/latest` are symlinks that readers may
//! follow at any moment. They are replaced by creating a fresh symlink next
//! to the alias and renaming it over the old one, so a reader sees either
//! the old target or the new one.

use std::io;
use std::path::{Path, PathBuf};

/// Points `link` at `target`, replacing any existing alias atomically
pub fn replace_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

    std::os::unix::fs::symlink(target, &temp)?;
    if let Err(e) = std::fs::rename(&temp, link) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    Ok(())
}

/// Reads the target of an alias, `None` if it does not exist
pub fn read_alias(link: &Path) -> io::Result<Option<PathBuf>> {
    match std::fs::read_link(link) {
        Ok(target) => Ok(Some(target)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_symlink_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let link = dir.path().join("latest");

        replace_symlink(&link, Path::new("a")).unwrap();
        assert_eq!(read_alias(&link).unwrap(), Some(PathBuf::from("a")));

        replace_symlink(&link, Path::new("b")).unwrap();
        assert_eq!(read_alias(&link).unwrap(), Some(PathBuf::from("b")));

        // no temporary links left behind
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_read_missing_alias() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_alias(&dir.path().join("nothing")).unwrap(), None);
    }
}
