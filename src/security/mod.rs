//! Path safety: normalization of plan paths, atomic bundle recognition, and
//! sanitization of rendered destinations.

pub mod bundles;
pub mod sanitize;

pub use bundles::{bundle_ancestor, is_bundle_name, is_within_bundle};
pub use sanitize::{sanitize_destination, sanitize_segment};

/// Validator for relative plan paths
pub struct PathValidator;

impl PathValidator {
    /// Normalize a relative plan path.
    ///
    /// Backslashes become forward slashes, leading/trailing slashes and `.`
    /// segments are dropped, empty segments are collapsed. Paths with parent
    /// traversal or a drive prefix are rejected.
    pub fn normalize_rel(path: &str) -> Result<String, String> {
        let unified = path.trim().replace('\\', "/");

        let bytes = unified.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            return Err(format!("Absolute path not allowed: {}", path));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(format!("Parent traversal not allowed: {}", path)),
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(format!("Empty path: '{}'", path));
        }
        Ok(segments.join("/"))
    }

    /// Parent directory of a normalized path, empty for top-level entries
    pub fn parent_of(rel_path: &str) -> &str {
        rel_path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    /// Final segment of a normalized path
    pub fn name_of(rel_path: &str) -> &str {
        rel_path.rsplit_once('/').map(|(_, name)| name).unwrap_or(rel_path)
    }
}
