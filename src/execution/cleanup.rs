use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::security::{is_bundle_name, is_within_bundle};

/// Remove directories under `root` left empty, deepest first.
///
/// Bundles and everything inside them are never touched, nor are the
/// directories in `keep` (those created by the current run). The root itself
/// is never removed. Returns the removed paths relative to `root`.
pub fn cleanup_empty_dirs(root: &Path, keep: &HashSet<PathBuf>) -> Vec<String> {
    // Pre-order so filter_entry prunes a bundle before its contents are seen
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && is_bundle_name(&entry.file_name().to_string_lossy()))
        });

    let mut candidates: Vec<(usize, PathBuf, String)> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry during cleanup");
                continue;
            }
        };
        if !entry.file_type().is_dir() || keep.contains(entry.path()) {
            continue;
        }
        let Some(rel) = relative(root, entry.path()) else {
            continue;
        };
        if is_within_bundle(&rel) {
            continue;
        }
        candidates.push((entry.depth(), entry.into_path(), rel));
    }

    // Stable sort keeps walk order among directories of equal depth
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = Vec::new();
    for (_, path, rel) in candidates {
        let is_empty = fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }

        match fs::remove_dir(&path) {
            Ok(()) => {
                tracing::debug!(path = %rel, "Removed empty directory");
                removed.push(rel);
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not remove directory");
            }
        }
    }

    removed
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_removes_nested_empty_dirs_bottom_up() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::create_dir_all(dir.path().join("keep_me")).unwrap();
        fs::write(dir.path().join("keep_me/file.txt"), b"x").unwrap();

        let removed = cleanup_empty_dirs(dir.path(), &HashSet::new());

        assert_eq!(removed, vec!["a/b/c", "a/b", "a"]);
        assert!(dir.path().join("keep_me").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_bundle_contents_are_protected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Work/Project.dspproj/Contents/Empty")).unwrap();
        fs::create_dir_all(dir.path().join("Empty.app")).unwrap();

        let removed = cleanup_empty_dirs(dir.path(), &HashSet::new());

        assert!(removed.is_empty());
        assert!(dir.path().join("Work/Project.dspproj/Contents/Empty").exists());
        assert!(dir.path().join("Empty.app").exists());
    }

    #[test]
    fn test_nested_bundle_spared_while_siblings_cleaned() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Old/Sub")).unwrap();
        fs::create_dir_all(dir.path().join("Audio/Project.dspproj/Contents/Empty")).unwrap();
        fs::create_dir_all(dir.path().join("Audio/Stale")).unwrap();

        let mut removed = cleanup_empty_dirs(dir.path(), &HashSet::new());
        removed.sort();

        assert_eq!(removed, vec!["Audio/Stale", "Old", "Old/Sub"]);
        assert!(dir.path().join("Audio/Project.dspproj/Contents/Empty").is_dir());
    }

    #[test]
    fn test_keep_set_is_respected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Photos/2023")).unwrap();
        let keep: HashSet<PathBuf> = [dir.path().join("Photos"), dir.path().join("Photos/2023")]
            .into_iter()
            .collect();

        assert!(cleanup_empty_dirs(dir.path(), &keep).is_empty());
        assert!(dir.path().join("Photos/2023").exists());
    }
}
