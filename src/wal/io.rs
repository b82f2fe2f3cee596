//! Crash-safe I/O helpers
//!
//! Used for everything the engine persists (plan documents, reports, the undo
//! journal's directory entry) and for the cross-device copy fallback:
//! - Atomic writes with fsync
//! - Directory synchronization
//! - Symlink-aware type checks and copies

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Error type for safe I/O operations
#[derive(Debug, Clone)]
pub struct SafeIoError {
    pub message: String,
    pub kind: SafeIoErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeIoErrorKind {
    WriteError,
    SyncError,
    RenameError,
    PathError,
    SymlinkError,
    CopyError,
}

impl SafeIoError {
    fn new(kind: SafeIoErrorKind, message: String) -> Self {
        Self { message, kind }
    }
}

impl std::fmt::Display for SafeIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SafeIoError {}

impl From<SafeIoError> for String {
    fn from(err: SafeIoError) -> Self {
        err.message
    }
}

/// Write data to a file atomically with fsync
///
/// This function:
/// 1. Writes data to a temporary file in the same directory
/// 2. Calls fsync on the file to ensure data is on disk
/// 3. Atomically renames the temp file to the target
/// 4. Syncs the directory to ensure the rename is durable
///
/// If any step fails, the temporary file is cleaned up.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), SafeIoError> {
    let parent = path.parent().ok_or_else(|| {
        SafeIoError::new(
            SafeIoErrorKind::PathError,
            format!("Cannot determine parent directory for: {}", path.display()),
        )
    })?;

    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::WriteError,
                format!("Failed to create directory {}: {}", parent.display(), e),
            )
        })?;
    }

    let temp_name = format!(
        ".{}.tmp.{}",
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "plan".to_string()),
        std::process::id()
    );
    let temp_path = parent.join(&temp_name);

    let write_result = (|| -> Result<(), SafeIoError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| {
                SafeIoError::new(
                    SafeIoErrorKind::WriteError,
                    format!("Failed to create temp file {}: {}", temp_path.display(), e),
                )
            })?;

        file.write_all(data).map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::WriteError,
                format!("Failed to write to temp file: {}", e),
            )
        })?;

        file.sync_all().map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::SyncError,
                format!("Failed to sync temp file: {}", e),
            )
        })
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(SafeIoError::new(
            SafeIoErrorKind::RenameError,
            format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ),
        ));
    }

    sync_directory(if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    })
}

/// Sync a directory so that entries created or renamed in it are durable
///
/// On POSIX systems, this opens the directory and calls fsync. Elsewhere it
/// is a no-op.
pub fn sync_directory(path: &Path) -> Result<(), SafeIoError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        let dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY)
            .open(path)
            .map_err(|e| {
                SafeIoError::new(
                    SafeIoErrorKind::SyncError,
                    format!("Failed to open directory {}: {}", path.display(), e),
                )
            })?;

        dir.sync_all().map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::SyncError,
                format!("Failed to sync directory {}: {}", path.display(), e),
            )
        })?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Information about a path's type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTypeInfo {
    File,
    Directory,
    Symlink,
    /// Device, socket, fifo
    Other,
}

/// Get file type information without following symlinks
pub fn file_type_no_follow(path: &Path) -> Result<FileTypeInfo, io::Error> {
    let meta = fs::symlink_metadata(path)?;

    if meta.is_symlink() {
        Ok(FileTypeInfo::Symlink)
    } else if meta.is_file() {
        Ok(FileTypeInfo::File)
    } else if meta.is_dir() {
        Ok(FileTypeInfo::Directory)
    } else {
        Ok(FileTypeInfo::Other)
    }
}

/// Whether anything (including a dangling symlink) occupies `path`
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// First intermediate component of `rel` under `root` that is a symlink.
///
/// The final component is not inspected; missing components end the walk
/// since nothing past them can be followed.
pub fn symlinked_ancestor(root: &Path, rel: &str) -> Option<PathBuf> {
    let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    let (_, ancestors) = segments.split_last()?;

    let mut current = root.to_path_buf();
    for segment in ancestors {
        current.push(segment);
        match file_type_no_follow(&current) {
            Ok(FileTypeInfo::Symlink) => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Refuse to operate on a symlink
pub fn ensure_not_symlink(path: &Path, operation: &str) -> Result<(), SafeIoError> {
    if matches!(file_type_no_follow(path), Ok(FileTypeInfo::Symlink)) {
        return Err(SafeIoError::new(
            SafeIoErrorKind::SymlinkError,
            format!("Refusing to {} symlink: {}", operation, path.display()),
        ));
    }
    Ok(())
}

/// Copy a single file and fsync the copy
pub fn copy_file_synced(src: &Path, dst: &Path) -> Result<u64, SafeIoError> {
    ensure_not_symlink(src, "copy from")?;

    let copy_err = |e: io::Error| {
        SafeIoError::new(
            SafeIoErrorKind::CopyError,
            format!("Failed to copy {} to {}: {}", src.display(), dst.display(), e),
        )
    };

    let bytes = fs::copy(src, dst).map_err(copy_err)?;
    File::open(dst)
        .and_then(|f| f.sync_all())
        .map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::SyncError,
                format!("Failed to sync {}: {}", dst.display(), e),
            )
        })?;
    Ok(bytes)
}

/// Copy a directory recursively, skipping symlinks with warning
///
/// Returns the number of files copied.
pub fn copy_dir_safe(src: &Path, dst: &Path) -> Result<usize, SafeIoError> {
    ensure_not_symlink(src, "copy from")?;

    if !src.is_dir() {
        return Err(SafeIoError::new(
            SafeIoErrorKind::PathError,
            format!("Source is not a directory: {}", src.display()),
        ));
    }

    fs::create_dir_all(dst).map_err(|e| {
        SafeIoError::new(
            SafeIoErrorKind::WriteError,
            format!("Failed to create directory {}: {}", dst.display(), e),
        )
    })?;

    let entries = fs::read_dir(src).map_err(|e| {
        SafeIoError::new(
            SafeIoErrorKind::CopyError,
            format!("Failed to read directory {}: {}", src.display(), e),
        )
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry.map_err(|e| {
            SafeIoError::new(
                SafeIoErrorKind::CopyError,
                format!("Failed to read entry in {}: {}", src.display(), e),
            )
        })?;

        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        match file_type_no_follow(&src_path) {
            Ok(FileTypeInfo::Symlink) => {
                tracing::warn!(path = %src_path.display(), "Skipping symlink during copy");
            }
            Ok(FileTypeInfo::Directory) => {
                copied += copy_dir_safe(&src_path, &dst_path)?;
            }
            Ok(FileTypeInfo::File) => {
                copy_file_synced(&src_path, &dst_path)?;
                copied += 1;
            }
            Ok(FileTypeInfo::Other) => {
                tracing::warn!(path = %src_path.display(), "Skipping special file during copy");
            }
            Err(e) => {
                return Err(SafeIoError::new(
                    SafeIoErrorKind::CopyError,
                    format!("Failed to stat {}: {}", src_path.display(), e),
                ));
            }
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn test_symlinked_ancestor() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("real/sub")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert_eq!(
            symlinked_ancestor(dir.path(), "link/secret.txt"),
            Some(dir.path().join("link"))
        );
        assert_eq!(symlinked_ancestor(dir.path(), "real/sub/file.txt"), None);
        assert_eq!(symlinked_ancestor(dir.path(), "link"), None);
        assert_eq!(symlinked_ancestor(dir.path(), "missing/link/x"), None);
    }

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");

        atomic_write(&path, b"{\"moves\": []}").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"moves\": []}");
    }

    #[test]
    fn test_atomic_write_replaces_and_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_type_no_follow() {
        let dir = tempdir().unwrap();

        let file = dir.path().join("file.txt");
        fs::write(&file, "content").unwrap();
        assert_eq!(file_type_no_follow(&file).unwrap(), FileTypeInfo::File);

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        assert_eq!(file_type_no_follow(&subdir).unwrap(), FileTypeInfo::Directory);

        #[cfg(unix)]
        {
            let link = dir.path().join("link.txt");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            assert_eq!(file_type_no_follow(&link).unwrap(), FileTypeInfo::Symlink);
            assert!(ensure_not_symlink(&link, "move").is_err());
        }
    }

    #[test]
    fn test_path_occupied_sees_dangling_links() {
        let dir = tempdir().unwrap();
        assert!(!path_occupied(&dir.path().join("missing")));

        #[cfg(unix)]
        {
            let link = dir.path().join("dangling");
            std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();
            assert!(path_occupied(&link));
        }
    }

    #[test]
    fn test_copy_dir_safe() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Project.fcpbundle");
        let dst = dir.path().join("copy.fcpbundle");

        fs::create_dir_all(src.join("Media")).unwrap();
        fs::write(src.join("project.xml"), "content1").unwrap();
        fs::write(src.join("Media").join("clip.mov"), "content2").unwrap();

        let count = copy_dir_safe(&src, &dst).unwrap();

        assert_eq!(count, 2);
        assert!(dst.join("project.xml").exists());
        assert!(dst.join("Media").join("clip.mov").exists());
    }
}
