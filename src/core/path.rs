//! core::path
//!
//! Volume-qualified metadata paths.
//!
//! A [`MetaPath`] is a volume name followed by zero or more path components.
//! The path with no components denotes the volume's root directory, which
//! has no parent.
//!
//! # Normalization
//!
//! Empty components (from leading, trailing or doubled slashes) are dropped.
//! `.` and `..` are rejected rather than interpreted; clients are expected
//! to send canonical paths.
//!
//! # Example
//!
//! ```
//! use metatx::core::path::MetaPath;
//!
//! let path = MetaPath::new("home", "/alice//logs/").unwrap();
//! assert_eq!(path.volume(), "home");
//! assert_eq!(path.components(), ["alice", "logs"]);
//! assert_eq!(path.last(), "logs");
//! assert_eq!(path.to_string(), "home/alice/logs");
//!
//! let root = MetaPath::new("home", "").unwrap();
//! assert!(root.is_volume_root());
//! assert_eq!(root.last(), "home");
//! ```

use std::fmt;

use super::types::TypeError;

/// Maximum length of a single path component in bytes.
pub const MAX_COMPONENT_LEN: usize = 1024;

/// A validated, normalized path inside a volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaPath {
    volume: String,
    components: Vec<String>,
}

impl MetaPath {
    /// Parse a path relative to `volume`.
    ///
    /// # Errors
    ///
    /// - `TypeError::InvalidVolumeName` if the volume name is empty or
    ///   contains `/` or control characters
    /// - `TypeError::InvalidPath` if a component is `.`/`..`, too long, or
    ///   contains a NUL byte
    pub fn new(volume: &str, path: &str) -> Result<Self, TypeError> {
        validate_volume_name(volume)?;

        let mut components = Vec::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(TypeError::InvalidPath(format!(
                    "relative component '{}' is not allowed",
                    component
                )));
            }
            if component.len() > MAX_COMPONENT_LEN {
                return Err(TypeError::InvalidPath(format!(
                    "component exceeds {} bytes",
                    MAX_COMPONENT_LEN
                )));
            }
            if component.contains('\0') {
                return Err(TypeError::InvalidPath(
                    "component cannot contain NUL".into(),
                ));
            }
            components.push(component.to_string());
        }

        Ok(Self {
            volume: volume.to_string(),
            components,
        })
    }

    /// The volume name.
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Path components below the volume root.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// True if the path names the volume root itself.
    pub fn is_volume_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The final name: the last component, or the volume name for the root.
    pub fn last(&self) -> &str {
        self.components.last().map_or(self.volume.as_str(), String::as_str)
    }

    /// Components leading to the parent directory (excluding the last one).
    pub fn parent_components(&self) -> &[String] {
        match self.components.split_last() {
            Some((_, prefix)) => prefix,
            None => &[],
        }
    }
}

impl fmt::Display for MetaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.volume)?;
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

/// Validate a volume name.
pub fn validate_volume_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::InvalidVolumeName(
            "volume name cannot be empty".into(),
        ));
    }
    if name.contains('/') {
        return Err(TypeError::InvalidVolumeName(format!(
            "volume name '{}' cannot contain '/'",
            name
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(TypeError::InvalidVolumeName(
            "volume name cannot contain control characters".into(),
        ));
    }
    Ok(())
}
