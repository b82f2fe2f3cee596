//! Engine configuration
//!
//! Defaults suit a desktop machine reorganizing an external drive. Every
//! field can be overridden from the environment (or a `.env` file):
//!
//! | Variable | Field |
//! |---|---|
//! | `REORGANIZE_WORKERS` | `workers` |
//! | `REORGANIZE_BATCH_SIZE` | `batch_size` |
//! | `REORGANIZE_PREVIEW_LIMIT` | `preview_limit` |
//! | `REORGANIZE_MAX_COLLISION_ATTEMPTS` | `max_collision_attempts` |
//! | `REORGANIZE_MAX_RECORDED_FAILURES` | `max_recorded_failures` |
//! | `REORGANIZE_JOURNAL_DIR` | `journal_dir` |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::planning::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum moves in flight at once
    pub workers: usize,
    /// Moves pulled from the plan per batch
    pub batch_size: usize,
    /// Moves kept in a dry-run preview
    pub preview_limit: usize,
    pub max_collision_attempts: u32,
    /// Failures kept (with reasons) in the report; the count is always exact
    pub max_recorded_failures: usize,
    /// Where undo journals are written
    pub journal_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            batch_size: 1000,
            preview_limit: 10,
            max_collision_attempts: DEFAULT_MAX_ATTEMPTS,
            max_recorded_failures: 500,
            journal_dir: default_journal_dir(),
        }
    }
}

/// `<data dir>/reorganize/journals`, falling back to the working directory
pub fn default_journal_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reorganize")
        .join("journals")
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "REORGANIZE_WORKERS", &mut self.workers);
        override_from(&lookup, "REORGANIZE_BATCH_SIZE", &mut self.batch_size);
        override_from(&lookup, "REORGANIZE_PREVIEW_LIMIT", &mut self.preview_limit);
        override_from(
            &lookup,
            "REORGANIZE_MAX_COLLISION_ATTEMPTS",
            &mut self.max_collision_attempts,
        );
        override_from(
            &lookup,
            "REORGANIZE_MAX_RECORDED_FAILURES",
            &mut self.max_recorded_failures,
        );
        if let Some(dir) = lookup("REORGANIZE_JOURNAL_DIR").filter(|d| !d.trim().is_empty()) {
            self.journal_dir = PathBuf::from(dir);
        }

        self.workers = self.workers.max(1);
        self.batch_size = self.batch_size.max(1);
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparsable config override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.preview_limit, 10);
        assert_eq!(config.max_collision_attempts, 100_000);
        assert!(config.journal_dir.ends_with("reorganize/journals"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("REORGANIZE_WORKERS", "0"),
            ("REORGANIZE_BATCH_SIZE", "50"),
            ("REORGANIZE_PREVIEW_LIMIT", "lots"),
            ("REORGANIZE_JOURNAL_DIR", "/tmp/journals"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.workers, 1);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.preview_limit, 10);
        assert_eq!(config.journal_dir, PathBuf::from("/tmp/journals"));
    }
}
