//! Sanitization of rendered destination folders.
//!
//! Template output can carry oracle-authored text into directory names.
//! Characters that are illegal on common target filesystems (FAT/exFAT/NTFS
//! removable drives in particular) are replaced before a path is planned.

use regex::Regex;
use std::sync::OnceLock;

fn illegal_chars() -> &'static Regex {
    static ILLEGAL: OnceLock<Regex> = OnceLock::new();
    ILLEGAL.get_or_init(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).expect("static pattern is valid"))
}

/// Sanitize one directory segment.
///
/// Returns `None` when nothing usable remains (empty, `.` or `..`).
pub fn sanitize_segment(segment: &str) -> Option<String> {
    let replaced = illegal_chars().replace_all(segment, "_");
    let trimmed = replaced.trim_start().trim_end_matches(|c: char| c == ' ' || c == '.');

    match trimmed {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Sanitize every directory segment of a rendered path, keeping the final
/// filename untouched.
pub fn sanitize_destination(rendered: &str, file_name: &str) -> String {
    let normalized = rendered.replace('\\', "/");
    let mut segments: Vec<&str> = normalized.split('/').collect();
    if segments.last() == Some(&file_name) {
        segments.pop();
    }

    let mut parts: Vec<String> = segments.into_iter().filter_map(sanitize_segment).collect();
    parts.push(file_name.to_string());
    parts.join("/")
}
