//! Write-ahead undo journaling
//!
//! Every move the engine executes is preceded by a durable record of its
//! inverse, so an interrupted or completed run can be reversed by replaying
//! the journal through the same engine.
//!
//! ## Modules
//! - `io` - Safe I/O utilities (atomic writes, fsync, symlink-aware copies)
//! - `journal` - The per-run undo journal with file locking

pub mod io;
pub mod journal;

pub use io::{
    atomic_write, copy_dir_safe, copy_file_synced, ensure_not_symlink, file_type_no_follow,
    path_occupied, symlinked_ancestor, sync_directory, FileTypeInfo, SafeIoError, SafeIoErrorKind,
};
pub use journal::UndoJournal;
