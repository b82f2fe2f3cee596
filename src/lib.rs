//! Rule-based plan generation and transactional execution for reorganizing
//! large file trees.
//!
//! Records from a scan are matched against prioritized rules, rendered into
//! collision-free destinations, validated against the live filesystem, and
//! executed in parallel with a write-ahead undo journal.
//!
//! ```no_run
//! use reorganize::{
//!     check_coverage, catch_all_rules, generate_plan, ApplyOptions, EngineConfig,
//!     ExecutionEngine, FileRecord, RuleSet,
//! };
//! use std::path::Path;
//!
//! # async fn run(records: Vec<FileRecord>, oracle_text: &str) -> reorganize::Result<()> {
//! let mut rules: RuleSet = reorganize::oracle::parse_rules(oracle_text)?;
//! let coverage = check_coverage(records.clone(), &rules);
//! rules.extend(catch_all_rules(&coverage.unmatched));
//!
//! let config = EngineConfig::from_env();
//! let plan = generate_plan(records, &rules, config.max_collision_attempts);
//! let report = ExecutionEngine::new(config)
//!     .apply_plan(Path::new("/Volumes/Archive"), &plan, ApplyOptions::apply())
//!     .await?;
//! println!("moved {} files", report.moves_executed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod oracle;
pub mod persist;
pub mod planning;
pub mod rules;
pub mod security;
pub mod wal;

pub use config::EngineConfig;
pub use error::{Collision, EngineError, MoveError, Result};
pub use execution::{ApplyOptions, CancellationFlag, ExecutionEngine};
pub use models::{ExecutionReport, FileRecord, Move, MoveFailure, Plan, StreamHeader};
pub use planning::{
    direct_plan, generate_moves, generate_plan, validate_plan, DestinationAllocator, PlanValidator,
    ValidatedPlan,
};
pub use rules::{catch_all_rules, check_coverage, CoverageReport, MatchCriteria, OrganizationRule, RuleSet};
