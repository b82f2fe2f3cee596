//! Append-only undo journal
//!
//! One journal per apply run: a line-delimited file whose first line is an
//! `undo_header` and whose remaining lines are inverse moves. Each inverse is
//! written and synced before the forward move is attempted, so a run that is
//! interrupted at any point can still be reversed by applying its journal.

use chrono::Local;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::io::sync_directory;
use crate::error::{EngineError, MoveError, Result};
use crate::models::{Move, StreamHeader};

/// Handle to the undo journal of a single run.
///
/// Appends from concurrent workers are serialized through an internal mutex;
/// the file itself is held under an exclusive advisory lock for the lifetime
/// of the handle.
#[derive(Debug)]
pub struct UndoJournal {
    path: PathBuf,
    run_id: String,
    file: Mutex<File>,
    entries: AtomicUsize,
}

impl UndoJournal {
    /// Create a fresh journal in `dir` for a run against `root`.
    pub fn create(dir: &Path, root: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;

        let run_id = Uuid::new_v4().to_string();
        let now = Local::now();
        let file_name = format!(
            "undo_{}_{}.jsonl",
            now.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        );
        let path = dir.join(file_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| EngineError::io(&path, e))?;

        file.try_lock_exclusive().map_err(|e| {
            EngineError::Journal(format!("Failed to lock {}: {}", path.display(), e))
        })?;

        let header = StreamHeader::UndoHeader {
            root: root.to_string_lossy().to_string(),
            created_at: now.to_rfc3339(),
            run_id: run_id.clone(),
        };
        let line = serde_json::to_string(&header)
            .map_err(EngineError::encode("journal header"))?;
        writeln!(file, "{}", line).map_err(|e| EngineError::io(&path, e))?;
        file.sync_all().map_err(|e| EngineError::io(&path, e))?;
        sync_directory(dir)?;

        tracing::info!(path = %path.display(), run_id = %run_id, "Created undo journal");

        Ok(Self {
            path,
            run_id,
            file: Mutex::new(file),
            entries: AtomicUsize::new(0),
        })
    }

    /// Durably record the inverse of `mv`.
    ///
    /// Must complete before `mv` is executed.
    pub fn record(&self, mv: &Move) -> std::result::Result<(), MoveError> {
        let line = serde_json::to_string(&mv.inverse())
            .map_err(|e| MoveError::Journal(e.to_string()))?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| MoveError::Journal("journal lock poisoned".to_string()))?;

        writeln!(file, "{}", line).map_err(|e| MoveError::Journal(e.to_string()))?;
        file.sync_data()
            .map_err(|e| MoveError::Journal(e.to_string()))?;

        self.entries.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Inverse moves recorded so far
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Release the lock. A journal with no entries is removed and `None`
    /// returned; otherwise its path.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        let entries = self.entries();
        let file = self
            .file
            .into_inner()
            .map_err(|_| EngineError::Journal("journal lock poisoned".to_string()))?;
        file.sync_all().map_err(|e| EngineError::io(&self.path, e))?;
        FileExt::unlock(&file)
            .map_err(|e| EngineError::Journal(format!("Failed to unlock {}: {}", self.path.display(), e)))?;
        drop(file);

        if entries == 0 {
            fs::remove_file(&self.path).map_err(|e| EngineError::io(&self.path, e))?;
            tracing::debug!(path = %self.path.display(), "Removed empty undo journal");
            return Ok(None);
        }

        tracing::info!(path = %self.path.display(), entries, "Undo journal closed");
        Ok(Some(self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_header_then_inverses() {
        let dir = tempdir().unwrap();
        let journal = UndoJournal::create(dir.path(), Path::new("/mnt/hdd")).unwrap();
        journal.record(&Move::new("a/x.txt", "Docs/x.txt", "Docs")).unwrap();

        let path = journal.finish().unwrap().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let header: StreamHeader = serde_json::from_str(lines[0]).unwrap();
        assert!(header.is_undo());
        assert_eq!(header.root(), "/mnt/hdd");

        let inverse: Move = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(inverse.old_rel, "Docs/x.txt");
        assert_eq!(inverse.new_rel, "a/x.txt");
    }

    #[test]
    fn test_journal_is_locked_while_open() {
        let dir = tempdir().unwrap();
        let journal = UndoJournal::create(dir.path(), Path::new("/r")).unwrap();

        let other = File::open(journal.path()).unwrap();
        assert!(other.try_lock_exclusive().is_err());
    }

    #[test]
    fn test_concurrent_appends_are_whole_lines() {
        let dir = tempdir().unwrap();
        let journal = Arc::new(UndoJournal::create(dir.path(), Path::new("/r")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let journal = Arc::clone(&journal);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mv = Move::new(format!("in/{}_{}.txt", t, i), format!("out/{}_{}.txt", t, i), "x");
                        journal.record(&mv).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(journal.entries(), 200);
        let journal = Arc::try_unwrap(journal).unwrap();
        let content = fs::read_to_string(journal.finish().unwrap().unwrap()).unwrap();
        for line in content.lines().skip(1) {
            serde_json::from_str::<Move>(line).unwrap();
        }
    }

    #[test]
    fn test_empty_journal_is_removed() {
        let dir = tempdir().unwrap();
        let journal = UndoJournal::create(dir.path(), Path::new("/r")).unwrap();
        let path = journal.path().to_path_buf();
        assert!(journal.finish().unwrap().is_none());
        assert!(!path.exists());
    }
}
