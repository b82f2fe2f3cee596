//! Error taxonomy for planning and execution.
//!
//! `EngineError` covers everything that aborts a call before (or instead of)
//! mutating the filesystem. Per-move problems during execution are `MoveError`s:
//! they are counted in the report and never propagated.

use std::path::PathBuf;
use thiserror::Error;

use crate::wal::SafeIoError;

/// Two distinct sources that were assigned the same destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub first_source: String,
    pub second_source: String,
    pub destination: String,
}

impl std::fmt::Display for Collision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' and '{}' both target '{}'",
            self.first_source, self.second_source, self.destination
        )
    }
}

fn first_collision(collisions: &[Collision]) -> String {
    collisions
        .first()
        .map(|c| format!(", first: {}", c))
        .unwrap_or_default()
}

/// Fatal errors. Nothing in this enum is raised after a move has executed,
/// except `Io` from post-run cleanup bookkeeping.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The root directory cannot be resolved (e.g. removable media disconnected)
    #[error("Root directory not found: {} (is the drive connected?)", .0.display())]
    RootUnreachable(PathBuf),

    /// Distinct sources map to the same destination
    #[error("Plan has {} destination collision(s){}", .0.len(), first_collision(.0))]
    DestinationCollisions(Vec<Collision>),

    /// Plan or oracle text could not be parsed or salvaged
    #[error("Failed to parse plan: {0}")]
    PlanParse(String),

    /// A value could not be serialized for persistence
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An oracle-authored rule failed boundary validation
    #[error("Invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    /// The undo journal could not be created, locked, or read
    #[error("Undo journal error: {0}")]
    Journal(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    SafeIo(#[from] SafeIoError),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    /// `map_err` adapter for serialization failures
    pub fn encode(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| EngineError::Encode { what, source }
    }
}

impl From<EngineError> for String {
    fn from(err: EngineError) -> Self {
        err.to_string()
    }
}

/// Why a single move was skipped or failed. Never fatal to the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("Unsafe path: {0}")]
    InvalidPath(String),

    #[error("Source no longer exists: {0}")]
    SourceMissing(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(String),

    #[error("Cross-device move blocked: {0}")]
    CrossDevice(String),

    #[error("Failed to journal inverse move: {0}")]
    Journal(String),

    #[error("Failed to move {path}: {message}")]
    Io { path: String, message: String },
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
