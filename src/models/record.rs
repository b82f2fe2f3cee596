use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extension value marking a record as an atomic bundle (a directory that is
/// moved whole and never descended into).
pub const BUNDLE_MARKER: &str = "/";

/// One file or atomic-bundle entry from a scan snapshot.
///
/// Timestamps are kept in the scanner's ISO-8601 text form and parsed on
/// demand; a record whose timestamp cannot be parsed simply fails any date
/// predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Posix-style path relative to the scan root
    pub rel_path: String,
    /// Size in bytes (directory entry size for bundles)
    #[serde(default)]
    pub size_bytes: u64,
    /// Filesystem modification time (ISO 8601)
    #[serde(default)]
    pub modified: String,
    /// Capture time (e.g. EXIF DateTimeOriginal), preferred over `modified`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_taken: Option<String>,
    /// Lowercase extension with leading dot, empty, or [`BUNDLE_MARKER`]
    #[serde(default)]
    pub ext: String,
}

impl FileRecord {
    /// Record for a regular file; the extension is derived from the path.
    pub fn file(rel_path: impl Into<String>, size_bytes: u64, modified: impl Into<String>) -> Self {
        let rel_path = rel_path.into();
        let ext = extension_of(&rel_path);
        Self {
            rel_path,
            size_bytes,
            modified: modified.into(),
            date_taken: None,
            ext,
        }
    }

    /// Record for an atomic bundle directory.
    pub fn bundle(rel_path: impl Into<String>, size_bytes: u64, modified: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            size_bytes,
            modified: modified.into(),
            date_taken: None,
            ext: BUNDLE_MARKER.to_string(),
        }
    }

    pub fn with_date_taken(mut self, date_taken: impl Into<String>) -> Self {
        self.date_taken = Some(date_taken.into());
        self
    }

    /// Build a record from an existing path under `root`.
    ///
    /// Directories become bundle records; symlinks are not followed.
    pub fn from_path(root: &Path, path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::symlink_metadata(path)?;
        let rel = path.strip_prefix(root).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not under {}", path.display(), root.display()),
            )
        })?;
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");

        let modified = metadata
            .modified()
            .ok()
            .map(|t| {
                DateTime::<Local>::from(t)
                    .naive_local()
                    .format("%Y-%m-%dT%H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default();

        if metadata.is_dir() {
            Ok(Self::bundle(rel_path, metadata.len(), modified))
        } else {
            Ok(Self::file(rel_path, metadata.len(), modified))
        }
    }

    pub fn is_bundle(&self) -> bool {
        self.ext == BUNDLE_MARKER
    }

    /// Final path segment (the original filename or bundle name)
    pub fn file_name(&self) -> &str {
        self.rel_path
            .trim_end_matches(is_separator)
            .rsplit(is_separator)
            .next()
            .unwrap_or("")
    }

    /// Name of the immediate parent folder, empty for top-level entries
    pub fn parent_name(&self) -> &str {
        let mut parts = self.rel_path.trim_end_matches(is_separator).rsplit(is_separator);
        parts.next();
        parts.next().unwrap_or("")
    }

    /// Extension lowercased with a leading dot; empty for bundles and
    /// extensionless files.
    pub fn normalized_ext(&self) -> String {
        if self.is_bundle() || self.ext.is_empty() {
            return String::new();
        }
        normalize_ext(&self.ext)
    }

    /// Capture time if present and non-empty, otherwise modification time.
    pub fn effective_timestamp(&self) -> Option<&str> {
        self.date_taken
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.modified.as_str()).filter(|s| !s.trim().is_empty()))
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.effective_timestamp().and_then(parse_timestamp)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Lowercase an extension and ensure it carries a leading dot.
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn extension_of(rel_path: &str) -> String {
    let name = rel_path.rsplit(is_separator).next().unwrap_or("");
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// Parse the timestamp shapes scanners and oracles produce.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS[.fff]`, the same with a space separator,
/// RFC 3339 with offset (compared in its local wall-clock time), and bare
/// dates (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use tempfile::tempdir;

    #[test]
    fn test_file_record_derives_extension() {
        let record = FileRecord::file("Photos/IMG_001.JPG", 10, "2023-01-01T00:00:00");
        assert_eq!(record.ext, ".jpg");
        assert_eq!(record.file_name(), "IMG_001.JPG");
        assert_eq!(record.parent_name(), "Photos");
        assert!(!record.is_bundle());

        let dotfile = FileRecord::file(".bashrc", 1, "");
        assert_eq!(dotfile.ext, "");
    }

    #[test]
    fn test_bundle_record() {
        let record = FileRecord::bundle("Discs/VIDEO_TS", 0, "");
        assert!(record.is_bundle());
        assert_eq!(record.normalized_ext(), "");
        assert_eq!(record.file_name(), "VIDEO_TS");
    }

    #[test]
    fn test_top_level_parent_is_empty() {
        let record = FileRecord::file("notes.txt", 1, "");
        assert_eq!(record.parent_name(), "");
    }

    #[test]
    fn test_capture_time_preferred() {
        let record = FileRecord::file("a.jpg", 1, "2020-05-01T10:00:00")
            .with_date_taken("2019-12-25T08:30:00");
        assert_eq!(record.timestamp().unwrap().year(), 2019);

        let blank_capture = FileRecord::file("a.jpg", 1, "2020-05-01T10:00:00").with_date_taken("");
        assert_eq!(blank_capture.timestamp().unwrap().year(), 2020);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2023-12-25T12:00:00").is_some());
        assert!(parse_timestamp("2023-12-25T12:00:00.123456").is_some());
        assert!(parse_timestamp("2023-12-25 12:00:00").is_some());
        assert!(parse_timestamp("2023-12-25T12:00:00+02:00").is_some());
        assert!(parse_timestamp("2023-12-25").is_some());
        assert!(parse_timestamp("Christmas").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/Project.fcp")).unwrap();
        std::fs::write(dir.path().join("sub/movie.MP4"), b"1234").unwrap();

        let file = FileRecord::from_path(dir.path(), &dir.path().join("sub/movie.MP4")).unwrap();
        assert_eq!(file.rel_path, "sub/movie.MP4");
        assert_eq!(file.ext, ".mp4");
        assert_eq!(file.size_bytes, 4);
        assert!(file.timestamp().is_some());

        let bundle = FileRecord::from_path(dir.path(), &dir.path().join("sub/Project.fcp")).unwrap();
        assert!(bundle.is_bundle());
    }
}
