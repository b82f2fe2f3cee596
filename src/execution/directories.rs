use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Idempotent, thread-safe directory creation under a root.
///
/// Remembers which directories it actually created so cleanup can leave
/// them alone. Safe to call concurrently for the same or overlapping paths.
#[derive(Debug)]
pub struct DirectoryCreator {
    root: PathBuf,
    state: Mutex<CreatorState>,
}

#[derive(Debug, Default)]
struct CreatorState {
    /// Directories known to exist (created or found)
    ensured: HashSet<PathBuf>,
    /// Directories this creator made
    created: HashSet<PathBuf>,
}

impl DirectoryCreator {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state: Mutex::new(CreatorState::default()),
        }
    }

    /// Ensure `rel_dir` (relative to the root) exists as a directory.
    ///
    /// Returns the number of directories newly created.
    pub fn ensure(&self, rel_dir: &str) -> io::Result<usize> {
        if rel_dir.is_empty() {
            return Ok(0);
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("directory state lock poisoned"))?;

        let target = self.root.join(rel_dir);
        if state.ensured.contains(&target) {
            return Ok(0);
        }

        let mut created = 0;
        let mut current = self.root.clone();
        for segment in rel_dir.split('/').filter(|s| !s.is_empty()) {
            current.push(segment);
            if state.ensured.contains(&current) {
                continue;
            }
            match fs::create_dir(&current) {
                Ok(()) => {
                    tracing::debug!(path = %current.display(), "Created directory");
                    state.created.insert(current.clone());
                    created += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !fs::symlink_metadata(&current)?.is_dir() {
                        return Err(io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            format!("{} exists and is not a directory", current.display()),
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
            state.ensured.insert(current.clone());
        }

        Ok(created)
    }

    /// Directories made by this creator
    pub fn created(&self) -> HashSet<PathBuf> {
        self.state
            .lock()
            .map(|s| s.created.clone())
            .unwrap_or_default()
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().map(|s| s.created.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_creates_nested_once() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("existing")).unwrap();
        let creator = DirectoryCreator::new(dir.path());

        assert_eq!(creator.ensure("existing/2023/Photos").unwrap(), 2);
        assert_eq!(creator.ensure("existing/2023/Photos").unwrap(), 0);
        assert_eq!(creator.ensure("existing/2023").unwrap(), 0);
        assert!(dir.path().join("existing/2023/Photos").is_dir());

        let created = creator.created();
        assert!(!created.contains(&dir.path().join("existing")));
        assert!(created.contains(&dir.path().join("existing/2023")));
    }

    #[test]
    fn test_file_in_the_way() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Docs"), b"x").unwrap();
        let creator = DirectoryCreator::new(dir.path());
        assert!(creator.ensure("Docs/2023").is_err());
    }

    #[test]
    fn test_concurrent_callers() {
        let dir = tempdir().unwrap();
        let creator = Arc::new(DirectoryCreator::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let creator = Arc::clone(&creator);
                std::thread::spawn(move || creator.ensure(&format!("shared/leaf{}", i % 2)).unwrap())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 3);
        assert_eq!(creator.created_count(), 3);
    }
}
