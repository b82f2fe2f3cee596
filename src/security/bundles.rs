//! Atomic bundle recognition.
//!
//! A bundle is a directory that represents one logical unit: an application
//! package, a disc-video structure, a project saved as a directory. Bundles
//! are moved whole and never pruned or rearranged internally.

/// Directory suffixes of macOS-style bundles and project packages
pub const BUNDLE_EXTENSIONS: &[&str] = &[
    // Application bundles
    ".app",
    ".bundle",
    ".plugin",
    ".kext",
    ".prefpane",
    ".qlgenerator",
    ".mdimporter",
    ".xpc",
    ".appex",
    // Pro app project bundles
    ".dvdproj",
    ".imovieproject",
    ".fcpproject",
    ".fcpbundle",
    ".fcp",
    ".dspproj",
    ".prproj",
    // Photo libraries
    ".photoslibrary",
    ".aplibrary",
];

/// Folder names that are structural units of discs, cameras, and editors
pub const BUNDLE_FOLDERS: &[&str] = &[
    "VIDEO_TS",
    "AUDIO_TS",
    "HVDVD_TS",
    "BDMV",
    "CERTIFICATE",
    "DCIM",
    "PRIVATE",
    "AVCHD",
    "MP_ROOT",
    "Capture Scratch",
    "Render Files",
    "Waveform Cache Files",
    "Thumbnail Cache Files",
    "Final Cut Pro Documents",
];

/// Whether a single path segment names a bundle
pub fn is_bundle_name(segment: &str) -> bool {
    if BUNDLE_FOLDERS.contains(&segment) {
        return true;
    }
    let lower = segment.to_lowercase();
    BUNDLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// First ancestor segment of `rel_path` that is a bundle, ignoring the final
/// segment (the object itself).
pub fn bundle_ancestor(rel_path: &str) -> Option<&str> {
    let segments: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
    let (_, ancestors) = segments.split_last()?;
    ancestors.iter().copied().find(|s| is_bundle_name(s))
}

/// Whether `rel_path` is a bundle or lies anywhere inside one
pub fn is_within_bundle(rel_path: &str) -> bool {
    rel_path
        .split('/')
        .filter(|s| !s.is_empty())
        .any(is_bundle_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_folders_are_case_sensitive() {
        assert!(is_bundle_name("VIDEO_TS"));
        assert!(is_bundle_name("Render Files"));
        assert!(!is_bundle_name("video_ts"));
    }

    #[test]
    fn test_bundle_extensions_are_case_insensitive() {
        assert!(is_bundle_name("Project.dspproj"));
        assert!(is_bundle_name("Editor.APP"));
        assert!(!is_bundle_name("Application Notes"));
    }

    #[test]
    fn test_bundle_ancestor_ignores_final_segment() {
        assert_eq!(bundle_ancestor("Movies/Project.fcp"), None);
        assert_eq!(
            bundle_ancestor("Movies/Project.fcp/Media/clip.mov"),
            Some("Project.fcp")
        );
        assert_eq!(bundle_ancestor("Disc/VIDEO_TS/VTS_01_1.VOB"), Some("VIDEO_TS"));
        assert_eq!(bundle_ancestor("plain.txt"), None);
    }

    #[test]
    fn test_is_within_bundle() {
        assert!(is_within_bundle("Project.dspproj"));
        assert!(is_within_bundle("Project.dspproj/Contents/Resources"));
        assert!(!is_within_bundle("Projects/Old"));
    }
}
