//! Execution Engine Module
//!
//! Applies validated plans to the filesystem: idempotent directory creation,
//! parallel journaled moves, and bottom-up cleanup of emptied directories.

pub mod cleanup;
pub mod device;
pub mod directories;
pub mod executor;

pub use cleanup::cleanup_empty_dirs;
pub use directories::DirectoryCreator;
pub use executor::{ApplyOptions, CancellationFlag, ExecutionEngine};
