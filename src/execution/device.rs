//! Storage-device checks and the explicit cross-device fallback.

use std::fs;
use std::io;
use std::path::Path;

use crate::wal::{
    copy_dir_safe, copy_file_synced, file_type_no_follow, FileTypeInfo, SafeIoError, SafeIoErrorKind,
};

/// Whether `src` and `dest_dir` live on the same device.
///
/// Platforms without device ids report `true`; a cross-device rename there
/// still surfaces as an error from the OS.
pub fn same_device(src: &Path, dest_dir: &Path) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let src_dev = fs::symlink_metadata(src)?.dev();
        let dest_dev = fs::metadata(dest_dir)?.dev();
        Ok(src_dev == dest_dev)
    }

    #[cfg(not(unix))]
    {
        let _ = (src, dest_dir);
        Ok(true)
    }
}

/// Whether a rename failed because source and destination are on different devices
pub fn is_cross_device_error(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }

    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Copy `src` to `dst` and remove the source. Bundles are copied recursively
/// (symlinks inside are skipped). A failed copy removes the partial
/// destination and leaves the source untouched.
pub fn copy_then_remove(src: &Path, dst: &Path) -> Result<(), SafeIoError> {
    let is_dir = matches!(file_type_no_follow(src), Ok(FileTypeInfo::Directory));

    let copied = if is_dir {
        copy_dir_safe(src, dst).map(|_| ())
    } else {
        copy_file_synced(src, dst).map(|_| ())
    };

    if let Err(e) = copied {
        let cleanup = if is_dir {
            fs::remove_dir_all(dst)
        } else {
            fs::remove_file(dst)
        };
        if let Err(cleanup_err) = cleanup {
            if cleanup_err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %dst.display(),
                    error = %cleanup_err,
                    "Failed to remove partial copy; destination may be incomplete"
                );
            }
        }
        return Err(e);
    }

    let removed = if is_dir {
        fs::remove_dir_all(src)
    } else {
        fs::remove_file(src)
    };
    removed.map_err(|e| SafeIoError {
        message: format!("Copied but failed to remove source {}: {}", src.display(), e),
        kind: SafeIoErrorKind::WriteError,
    })
}
