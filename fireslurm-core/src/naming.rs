//! Identifier rules
//!
//! Run names and bundle names become directory names and Slurm job names,
//! so they are restricted to a portable subset of POSIX file name characters.

use std::sync::LazyLock;

use regex::Regex;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static pattern"));

/// Names that would alias special directory entries
const RESERVED: &[&str] = &[".", "..", crate::domain::log::LATEST_ALIAS];

/// Why a name was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Empty,
    InvalidCharacters(String),
    Reserved(String),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::Empty => write!(f, "name must not be empty"),
            NameError::InvalidCharacters(name) => write!(
                f,
                "name '{}' may only contain letters, digits, '.', '-' and '_'",
                name
            ),
            NameError::Reserved(name) => write!(f, "name '{}' is reserved", name),
        }
    }
}

impl std::error::Error for NameError {}

/// Checks that `name` is safe to use as a path component and job name
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if RESERVED.contains(&name) {
        return Err(NameError::Reserved(name.to_string()));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(NameError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_portable_names() {
        assert!(validate_name("unified").is_ok());
        assert!(validate_name("core_v2.1-rc").is_ok());
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert!(matches!(
            validate_name("a/b"),
            Err(NameError::InvalidCharacters(_))
        ));
        assert!(matches!(
            validate_name("has space"),
            Err(NameError::InvalidCharacters(_))
        ));
        assert!(matches!(validate_name(".."), Err(NameError::Reserved(_))));
        assert!(matches!(validate_name("latest"), Err(NameError::Reserved(_))));
    }
}
