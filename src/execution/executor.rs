//! Execution Engine
//!
//! Applies moves against the live filesystem with bounded parallelism.
//! Moves are independent of one another (destinations are unique), so they
//! run on a worker pool with no ordering between them. The only per-move
//! ordering requirement, destination parent before move, is satisfied inside
//! each worker.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::cleanup::cleanup_empty_dirs;
use super::device::{copy_then_remove, is_cross_device_error, same_device};
use super::directories::DirectoryCreator;
use crate::config::EngineConfig;
use crate::error::{EngineError, MoveError, Result};
use crate::models::{ExecutionReport, Move, MoveFailure, Plan};
use crate::persist::{PlanFormat, PlanReader};
use crate::planning::validate_plan;
use crate::security::{bundle_ancestor, is_bundle_name, PathValidator};
use crate::wal::{file_type_no_follow, path_occupied, symlinked_ancestor, FileTypeInfo, UndoJournal};

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
    /// Permit copy+delete when source and destination are on different devices
    pub allow_cross_device: bool,
}

impl ApplyOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            allow_cross_device: false,
        }
    }

    pub fn apply() -> Self {
        Self::default()
    }
}

/// Cloneable interrupt handle. Once cancelled, no further moves are started;
/// moves already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared, read-mostly state handed to every worker
struct MoveContext {
    root: PathBuf,
    dirs: DirectoryCreator,
    journal: Option<UndoJournal>,
    allow_cross_device: bool,
}

/// Execution engine for move plans
pub struct ExecutionEngine {
    config: EngineConfig,
    cancel: CancellationFlag,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancellationFlag::new(),
        }
    }

    /// Use an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate `plan` against `root`, then execute what survives.
    pub async fn apply_plan(&self, root: &Path, plan: &Plan, options: ApplyOptions) -> Result<ExecutionReport> {
        let validated = validate_plan(root, plan)?;
        self.apply(root, &validated.folders_to_create, validated.moves, options)
            .await
    }

    /// Execute a persisted plan or undo journal.
    ///
    /// Single-document plans are validated first. Line-delimited plans and
    /// journals are streamed batch by batch; each move is still checked
    /// against the filesystem as it runs. `root` overrides the root recorded
    /// in the file.
    pub async fn apply_file(&self, root: Option<&Path>, path: &Path, options: ApplyOptions) -> Result<ExecutionReport> {
        let mut reader = PlanReader::open(path)?;
        let root = match (root, reader.root.as_deref()) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(recorded)) => PathBuf::from(recorded),
            (None, None) => {
                return Err(EngineError::PlanParse(format!(
                    "{} does not record a root directory",
                    path.display()
                )))
            }
        };

        tracing::info!(path = %path.display(), format = ?reader.format, "Applying plan file");

        if reader.format == PlanFormat::Document {
            let mut plan = Plan::new(std::mem::take(&mut reader.folders_to_create), reader.collect());
            plan.root = Some(root.to_string_lossy().to_string());
            return self.apply_plan(&root, &plan, options).await;
        }

        let folders = std::mem::take(&mut reader.folders_to_create);
        let report = self.apply(&root, &folders, &mut reader, options).await?;
        if reader.skipped() > 0 {
            tracing::warn!(skipped = reader.skipped(), "Plan file had malformed lines");
        }
        Ok(report)
    }

    /// Reverse a previous run by applying its undo journal.
    pub async fn undo(&self, journal: &Path, options: ApplyOptions) -> Result<ExecutionReport> {
        let reader = PlanReader::open(journal)?;
        if !reader.is_undo() {
            return Err(EngineError::Journal(format!(
                "{} is not an undo journal",
                journal.display()
            )));
        }
        drop(reader);
        self.apply_file(None, journal, options).await
    }

    /// Execute `moves` under `root`.
    ///
    /// Steps: resolve root (fatal if unreachable), create `folders_to_create`,
    /// run moves in batches on the worker pool, clean up emptied directories,
    /// report. Per-move problems are counted, never raised.
    pub async fn apply<I>(
        &self,
        root: &Path,
        folders_to_create: &[String],
        moves: I,
        options: ApplyOptions,
    ) -> Result<ExecutionReport>
    where
        I: IntoIterator<Item = Move>,
    {
        let root = resolve_root(root)?;
        let mut report = ExecutionReport::new(root.to_string_lossy().to_string(), options.dry_run);

        if options.dry_run {
            self.preview(&root, folders_to_create, moves, &mut report);
            return Ok(report);
        }

        let journal = UndoJournal::create(&self.config.journal_dir, &root)?;
        let ctx = Arc::new(MoveContext {
            root: root.clone(),
            dirs: DirectoryCreator::new(&root),
            journal: Some(journal),
            allow_cross_device: options.allow_cross_device,
        });

        let mut keep: HashSet<PathBuf> = HashSet::new();
        for folder in folders_to_create {
            match PathValidator::normalize_rel(folder) {
                Ok(folder) => {
                    if let Err(e) = ctx.dirs.ensure(&folder) {
                        tracing::warn!(folder = %folder, error = %e, "Failed to create folder");
                    }
                    keep.insert(root.join(&folder));
                }
                Err(e) => tracing::warn!(error = %e, "Skipping folder"),
            }
        }

        self.run_moves(&ctx, moves, &mut report).await?;

        keep.extend(ctx.dirs.created());
        report.folders_created = ctx.dirs.created_count();

        let cleanup_root = root.clone();
        let cleaned = tokio::task::spawn_blocking(move || cleanup_empty_dirs(&cleanup_root, &keep))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
        report.folders_cleaned = cleaned.len();

        let ctx = Arc::try_unwrap(ctx)
            .map_err(|_| EngineError::Task("move workers still hold the run context".to_string()))?;
        if let Some(journal) = ctx.journal {
            report.journal_path = journal.finish()?;
        }

        tracing::info!(
            root = %report.root,
            planned = report.moves_planned,
            executed = report.moves_executed,
            failed = report.moves_failed,
            folders_created = report.folders_created,
            folders_cleaned = report.folders_cleaned,
            cancelled = report.cancelled,
            "Apply complete"
        );

        Ok(report)
    }

    async fn run_moves<I>(&self, ctx: &Arc<MoveContext>, moves: I, report: &mut ExecutionReport) -> Result<()>
    where
        I: IntoIterator<Item = Move>,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let batch_size = self.config.batch_size.max(1);
        let mut moves = moves.into_iter();

        loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let batch: Vec<Move> = moves.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            tracing::debug!(size = batch.len(), "Starting batch");

            let mut tasks = JoinSet::new();
            for mv in batch {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }

                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Task(e.to_string()))?;
                let ctx = Arc::clone(ctx);
                report.moves_planned += 1;

                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    let result = execute_move(&ctx, &mv);
                    (mv, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((mv, Ok(()))) => {
                        report.moves_executed += 1;
                        tracing::debug!(from = %mv.old_rel, to = %mv.new_rel, "Moved");
                    }
                    Ok((mv, Err(e))) => {
                        tracing::warn!(from = %mv.old_rel, to = %mv.new_rel, error = %e, "Move skipped");
                        self.record_failure(report, &mv, e.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Move worker failed");
                        report.moves_failed += 1;
                    }
                }
            }

            if report.cancelled {
                tracing::warn!(submitted = report.moves_planned, "Apply cancelled; remaining moves not started");
                break;
            }
        }

        Ok(())
    }

    fn record_failure(&self, report: &mut ExecutionReport, mv: &Move, reason: String) {
        report.moves_failed += 1;
        if report.failures.len() < self.config.max_recorded_failures {
            report.failures.push(MoveFailure {
                old_rel: mv.old_rel.clone(),
                new_rel: mv.new_rel.clone(),
                reason,
            });
        }
    }

    /// Dry run: count and sample, touch nothing
    fn preview<I>(&self, root: &Path, folders_to_create: &[String], moves: I, report: &mut ExecutionReport)
    where
        I: IntoIterator<Item = Move>,
    {
        let mut would_create: HashSet<String> = HashSet::new();

        for folder in folders_to_create {
            if let Ok(folder) = PathValidator::normalize_rel(folder) {
                count_missing_dirs(root, &folder, &mut would_create);
            }
        }

        for mv in moves {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            count_missing_dirs(root, PathValidator::parent_of(&mv.new_rel), &mut would_create);
            report.moves_planned += 1;
            if report.preview.len() < self.config.preview_limit {
                report.preview.push(mv);
            }
        }

        report.folders_created = would_create.len();
        tracing::info!(
            moves = report.moves_planned,
            folders = report.folders_created,
            "Dry run complete"
        );
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    match root.canonicalize() {
        Ok(resolved) if resolved.is_dir() => Ok(resolved),
        _ => Err(EngineError::RootUnreachable(root.to_path_buf())),
    }
}

/// Add every missing ancestor of `rel_dir` (inclusive) to `missing`
fn count_missing_dirs(root: &Path, rel_dir: &str, missing: &mut HashSet<String>) {
    let mut prefix = String::new();
    for segment in rel_dir.split('/').filter(|s| !s.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        if !missing.contains(&prefix) && !root.join(&prefix).exists() {
            missing.insert(prefix.clone());
        }
    }
}

/// Perform one move. Runs on a blocking worker thread.
///
/// Streamed plans skip whole-plan validation, so the per-move safety checks
/// (normalized paths, no bundle interiors, no symlinked components, only
/// files or whole bundles as sources) are repeated here.
fn execute_move(ctx: &MoveContext, mv: &Move) -> std::result::Result<(), MoveError> {
    let old_rel = PathValidator::normalize_rel(&mv.old_rel).map_err(MoveError::InvalidPath)?;
    let new_rel = PathValidator::normalize_rel(&mv.new_rel).map_err(MoveError::InvalidPath)?;
    for rel in [&old_rel, &new_rel] {
        if let Some(bundle) = bundle_ancestor(rel) {
            return Err(MoveError::InvalidPath(format!("{} is inside bundle {}", rel, bundle)));
        }
    }
    let mv = &Move::new(old_rel, new_rel, mv.reason.clone());

    let src = ctx.root.join(&mv.old_rel);
    let dst = ctx.root.join(&mv.new_rel);

    for rel in [&mv.old_rel, &mv.new_rel] {
        if let Some(link) = symlinked_ancestor(&ctx.root, rel) {
            return Err(MoveError::InvalidPath(format!(
                "{} passes through symlink {}",
                rel,
                link.display()
            )));
        }
    }

    match file_type_no_follow(&src) {
        Ok(FileTypeInfo::File) => {}
        Ok(FileTypeInfo::Directory) if is_bundle_name(PathValidator::name_of(&mv.old_rel)) => {}
        Ok(FileTypeInfo::Directory) => {
            return Err(MoveError::InvalidPath(format!("{} is a directory, not a bundle", mv.old_rel)))
        }
        Ok(FileTypeInfo::Symlink) => {
            return Err(MoveError::InvalidPath(format!("{} is a symlink", mv.old_rel)))
        }
        Ok(FileTypeInfo::Other) => {
            return Err(MoveError::InvalidPath(format!("{} is not a regular file", mv.old_rel)))
        }
        Err(_) => return Err(MoveError::SourceMissing(mv.old_rel.clone())),
    }
    if path_occupied(&dst) {
        return Err(MoveError::DestinationExists(mv.new_rel.clone()));
    }

    let parent_rel = PathValidator::parent_of(&mv.new_rel);
    ctx.dirs.ensure(parent_rel).map_err(|e| MoveError::Io {
        path: parent_rel.to_string(),
        message: e.to_string(),
    })?;

    let dst_parent = dst.parent().unwrap_or(&ctx.root);
    let same = same_device(&src, dst_parent).map_err(|e| MoveError::Io {
        path: mv.old_rel.clone(),
        message: e.to_string(),
    })?;
    if !same && !ctx.allow_cross_device {
        return Err(MoveError::CrossDevice(mv.old_rel.clone()));
    }

    if let Some(journal) = &ctx.journal {
        journal.record(mv)?;
    }

    match fs::rename(&src, &dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) && ctx.allow_cross_device => {
            tracing::debug!(from = %mv.old_rel, "Rename crossed devices, copying instead");
            copy_then_remove(&src, &dst).map_err(|e| MoveError::Io {
                path: mv.old_rel.clone(),
                message: e.to_string(),
            })
        }
        Err(e) if is_cross_device_error(&e) => Err(MoveError::CrossDevice(mv.old_rel.clone())),
        Err(e) => Err(MoveError::Io {
            path: mv.old_rel.clone(),
            message: e.to_string(),
        }),
    }
}
