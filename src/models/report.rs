use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Move;

/// A move that was skipped or failed, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFailure {
    pub old_rel: String,
    pub new_rel: String,
    pub reason: String,
}

/// Outcome of one apply invocation.
///
/// In a dry run `folders_created` counts folders that *would* be created,
/// `moves_executed` is always zero, and `preview` holds the first few moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub root: String,
    pub dry_run: bool,
    pub executed_at: DateTime<Local>,
    pub folders_created: usize,
    /// Total moves submitted (or previewed) in this run
    pub moves_planned: usize,
    pub moves_executed: usize,
    pub moves_failed: usize,
    pub folders_cleaned: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<Move>,
    /// First failures, capped by configuration; `moves_failed` is the total
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MoveFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
    #[serde(default)]
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn new(root: String, dry_run: bool) -> Self {
        Self {
            root,
            dry_run,
            executed_at: Local::now(),
            folders_created: 0,
            moves_planned: 0,
            moves_executed: 0,
            moves_failed: 0,
            folders_cleaned: 0,
            preview: Vec::new(),
            failures: Vec::new(),
            journal_path: None,
            cancelled: false,
        }
    }

    /// Whether every submitted move succeeded
    pub fn success(&self) -> bool {
        self.moves_failed == 0 && !self.cancelled
    }
}
