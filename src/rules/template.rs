//! Destination template rendering.
//!
//! Supported placeholders:
//! - `{year}` - year of the capture/modification time, or `Unknown`
//! - `{month}` - English month name, or `Unknown`
//! - `{ext}` - extension without the dot
//! - `{type}` - `Photos`, `Videos`, `Documents` or `Misc`
//! - `{parent}` - immediate parent folder name
//! - `{original_name}` - original filename with extension
//! - `{event_name}` - the rule's event label (`Misc` when unset)

use chrono::{Datelike, Month};

use crate::models::FileRecord;
use crate::security::sanitize_segment;

const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "heic", "raw", "cr2", "nef",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx", "md",
];

/// Coarse classification used by the `{type}` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Photos,
    Videos,
    Documents,
    Misc,
}

impl FileKind {
    /// Classify a bare or dotted extension
    pub fn from_ext(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_lowercase();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Photos
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Videos
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Documents
        } else {
            FileKind::Misc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Photos => "Photos",
            FileKind::Videos => "Videos",
            FileKind::Documents => "Documents",
            FileKind::Misc => "Misc",
        }
    }
}

/// Render a destination path for `record`.
///
/// The result always ends with the record's original filename: if the
/// rendered template does not, the filename is appended. Directory segments
/// are sanitized and adjacent duplicates collapsed (`Misc/Misc` becomes
/// `Misc`, and `2023 - Misc/Misc` becomes `2023 - Misc`).
pub fn render_destination(template: &str, event_name: Option<&str>, record: &FileRecord) -> String {
    let original_name = record.file_name();
    if original_name.is_empty() {
        return record.rel_path.clone();
    }

    let (year, month) = match record.timestamp() {
        Some(ts) => (
            ts.year().to_string(),
            Month::try_from(ts.month() as u8)
                .map(|m| m.name().to_string())
                .unwrap_or_else(|_| "Unknown".to_string()),
        ),
        None => ("Unknown".to_string(), "Unknown".to_string()),
    };

    let ext = record.normalized_ext();
    let bare_ext = ext.trim_start_matches('.');
    let event = event_name
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or("Misc");

    let rendered = template
        .replace("{year}", &year)
        .replace("{month}", &month)
        .replace("{ext}", bare_ext)
        .replace("{type}", FileKind::from_ext(bare_ext).as_str())
        .replace("{parent}", record.parent_name())
        .replace("{original_name}", original_name)
        .replace("{event_name}", event)
        .replace('\\', "/");

    let mut segments: Vec<&str> = rendered.split('/').collect();
    if segments.last() == Some(&original_name) {
        segments.pop();
    }

    let folders = collapse_duplicates(segments.into_iter().filter_map(sanitize_segment));

    let mut parts = folders;
    parts.push(original_name.to_string());
    parts.join("/")
}

/// Drop a segment that equals the previous one, or that the previous one
/// already ends with as a ` - name` or ` name` suffix.
fn collapse_duplicates(segments: impl Iterator<Item = String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for segment in segments {
        if let Some(prev) = kept.last() {
            if *prev == segment
                || prev.ends_with(&format!(" - {}", segment))
                || prev.ends_with(&format!(" {}", segment))
            {
                continue;
            }
        }
        kept.push(segment);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> FileRecord {
        FileRecord::file("Camera/IMG_0001.jpg", 100, "2023-07-14T10:00:00")
    }

    #[test]
    fn test_placeholders() {
        let dest = render_destination("{year}/{month}/{type}/{parent}/{ext}", None, &photo());
        assert_eq!(dest, "2023/July/Photos/Camera/jpg/IMG_0001.jpg");
    }

    #[test]
    fn test_type_variable() {
        let cases = [("a.jpg", "Photos"), ("b.mp4", "Videos"), ("c.pdf", "Documents")];
        for (path, kind) in cases {
            let record = FileRecord::file(path, 1, "");
            assert_eq!(
                render_destination("Events/{type}/", None, &record),
                format!("Events/{}/{}", kind, path)
            );
        }
    }

    #[test]
    fn test_appends_filename_when_missing() {
        assert_eq!(render_destination("Archive", None, &photo()), "Archive/IMG_0001.jpg");
        assert_eq!(
            render_destination("Archive/{original_name}", None, &photo()),
            "Archive/IMG_0001.jpg"
        );
    }

    #[test]
    fn test_unknown_date() {
        let record = FileRecord::file("x/notes.txt", 1, "not a date");
        // Both placeholders render "Unknown", and adjacent duplicates collapse
        assert_eq!(render_destination("{year}/{month}", None, &record), "Unknown/notes.txt");

        let dated = FileRecord::file("x/notes.txt", 1, "2021-03-09T08:00:00");
        assert_eq!(render_destination("{year}/{month}", None, &dated), "2021/March/notes.txt");
    }

    #[test]
    fn test_default_event_collapses_into_template_text() {
        let record = FileRecord::file("x/readme.bin", 1, "2023-01-01T00:00:00");
        assert_eq!(
            render_destination("{year} - {event_name}/{event_name}", None, &record),
            "2023 - Misc/readme.bin"
        );
        assert_eq!(
            render_destination("{year} - Misc/{type}/{original_name}", Some("Misc"), &record),
            "2023 - Misc/readme.bin"
        );
        assert_eq!(
            render_destination("Misc/Misc/{original_name}", None, &record),
            "Misc/readme.bin"
        );
    }

    #[test]
    fn test_event_label() {
        assert_eq!(
            render_destination("{year} - {event_name}/{type}", Some("Wedding"), &photo()),
            "2023 - Wedding/Photos/IMG_0001.jpg"
        );
    }

    #[test]
    fn test_filename_never_collapsed() {
        let record = FileRecord::file("x/Misc", 1, "");
        assert_eq!(render_destination("Misc/{original_name}", None, &record), "Misc/Misc");
    }

    #[test]
    fn test_bundle_renders_as_whole() {
        let record = FileRecord::bundle("Old/VIDEO_TS", 0, "2010-02-01T00:00:00");
        assert_eq!(
            render_destination("Movies/{year}/{type}", None, &record),
            "Movies/2010/Misc/VIDEO_TS"
        );
    }

    #[test]
    fn test_empty_template_falls_back_to_root() {
        assert_eq!(render_destination("", None, &photo()), "IMG_0001.jpg");
        assert_eq!(render_destination("{parent}", None, &FileRecord::file("top.txt", 1, "")), "top.txt");
    }
}
