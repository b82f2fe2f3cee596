//! Safety checks applied to a plan before anything touches the filesystem.
//!
//! This is the last line of defense against hand-authored or oracle plans
//! that never went through the generator: it re-derives destination
//! uniqueness from scratch instead of trusting it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Collision, EngineError, Result};
use crate::models::{Move, Plan};
use crate::security::{bundle_ancestor, is_bundle_name, PathValidator};
use crate::wal::{file_type_no_follow, symlinked_ancestor, FileTypeInfo};

/// Moves and folders that passed validation, plus why others were dropped
#[derive(Debug, Clone, Default)]
pub struct ValidatedPlan {
    pub folders_to_create: Vec<String>,
    pub moves: Vec<Move>,
    pub warnings: Vec<String>,
}

impl ValidatedPlan {
    pub fn into_plan(self, root: &Path) -> Plan {
        let mut plan = Plan::new(self.folders_to_create, self.moves);
        plan.root = Some(root.to_string_lossy().to_string());
        plan
    }
}

pub struct PlanValidator {
    root: PathBuf,
}

impl PlanValidator {
    /// Resolve `root`, failing if it is unreachable.
    pub fn new(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|_| EngineError::RootUnreachable(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(EngineError::RootUnreachable(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filter `plan` down to safe moves.
    ///
    /// Rejected entries are recorded as warnings. Distinct sources sharing a
    /// destination fail the whole call with every colliding pair listed.
    pub fn validate(&self, plan: &Plan) -> Result<ValidatedPlan> {
        let mut validated = ValidatedPlan::default();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
        let mut destinations: HashMap<String, String> = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        let mut collisions = Vec::new();
        let mut bundle_skips = 0usize;

        for folder in &plan.folders_to_create {
            match PathValidator::normalize_rel(folder) {
                Ok(folder) if bundle_ancestor(&folder).is_some() || is_bundle_name(PathValidator::name_of(&folder)) => {
                    validated
                        .warnings
                        .push(format!("Skipping folder inside bundle: {}", folder));
                }
                Ok(folder) => {
                    if !validated.folders_to_create.contains(&folder) {
                        validated.folders_to_create.push(folder);
                    }
                }
                Err(e) => validated.warnings.push(format!("Skipping folder: {}", e)),
            }
        }

        for mv in &plan.moves {
            let (old_rel, new_rel) = match (
                PathValidator::normalize_rel(&mv.old_rel),
                PathValidator::normalize_rel(&mv.new_rel),
            ) {
                (Ok(old), Ok(new)) => (old, new),
                (Err(e), _) | (_, Err(e)) => {
                    validated.warnings.push(format!("Skipping - {}", e));
                    continue;
                }
            };

            if old_rel == new_rel {
                continue;
            }
            if !seen_pairs.insert((old_rel.clone(), new_rel.clone())) {
                continue;
            }

            if PathValidator::parent_of(&old_rel) == PathValidator::parent_of(&new_rel) {
                validated.warnings.push(format!(
                    "Skipping - rename not allowed: {} -> {}",
                    old_rel,
                    PathValidator::name_of(&new_rel)
                ));
                continue;
            }

            if let Some(bundle) = bundle_ancestor(&old_rel) {
                bundle_skips += 1;
                validated.warnings.push(format!(
                    "Skipping - source inside bundle '{}': {}",
                    bundle, old_rel
                ));
                continue;
            }
            if let Some(bundle) = bundle_ancestor(&new_rel) {
                bundle_skips += 1;
                validated.warnings.push(format!(
                    "Skipping - destination inside bundle '{}': {}",
                    bundle, new_rel
                ));
                continue;
            }

            if let Some(link) = symlinked_ancestor(&self.root, &old_rel)
                .or_else(|| symlinked_ancestor(&self.root, &new_rel))
            {
                validated.warnings.push(format!(
                    "Skipping - path passes through symlink {}: {} -> {}",
                    link.display(),
                    old_rel,
                    new_rel
                ));
                continue;
            }

            let src = self.root.join(&old_rel);
            match file_type_no_follow(&src) {
                Ok(FileTypeInfo::File) => {}
                Ok(FileTypeInfo::Directory) if is_bundle_name(PathValidator::name_of(&old_rel)) => {}
                Ok(FileTypeInfo::Directory) => {
                    validated
                        .warnings
                        .push(format!("Skipping - directory is not a bundle: {}", old_rel));
                    continue;
                }
                Ok(FileTypeInfo::Symlink) => {
                    validated
                        .warnings
                        .push(format!("Skipping - symlink: {}", old_rel));
                    continue;
                }
                Ok(FileTypeInfo::Other) => {
                    validated
                        .warnings
                        .push(format!("Skipping - not a file: {}", old_rel));
                    continue;
                }
                Err(_) => {
                    validated
                        .warnings
                        .push(format!("Skipping - file not found: {}", old_rel));
                    continue;
                }
            }

            if let Some(existing) = destinations.get(&new_rel) {
                collisions.push(Collision {
                    first_source: existing.clone(),
                    second_source: old_rel,
                    destination: new_rel,
                });
                continue;
            }

            if let Some(first_target) = sources.get(&old_rel) {
                validated.warnings.push(format!(
                    "Skipping - {} already moves to {}, ignoring {}",
                    old_rel, first_target, new_rel
                ));
                continue;
            }

            destinations.insert(new_rel.clone(), old_rel.clone());
            sources.insert(old_rel.clone(), new_rel.clone());
            validated.moves.push(Move::new(old_rel, new_rel, mv.reason.clone()));
        }

        if !collisions.is_empty() {
            tracing::warn!(count = collisions.len(), "Plan rejected: destination collisions");
            return Err(EngineError::DestinationCollisions(collisions));
        }

        if bundle_skips > 0 {
            tracing::info!(count = bundle_skips, "Filtered moves touching bundle internals");
        }
        for warning in validated.warnings.iter().take(5) {
            tracing::warn!("{}", warning);
        }
        if validated.warnings.len() > 5 {
            tracing::warn!("... and {} more skipped entries", validated.warnings.len() - 5);
        }
        tracing::info!(
            valid = validated.moves.len(),
            proposed = plan.moves.len(),
            "Plan validated"
        );

        Ok(validated)
    }
}

/// Validate `plan` against the filesystem under `root`.
pub fn validate_plan(root: &Path, plan: &Plan) -> Result<ValidatedPlan> {
    PlanValidator::new(root)?.validate(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("unplugged");
        assert!(matches!(
            validate_plan(&gone, &Plan::default()),
            Err(EngineError::RootUnreachable(_))
        ));
    }

    #[test]
    fn test_bundle_moved_whole_but_plain_dir_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("VIDEO_TS")).unwrap();
        fs::create_dir_all(dir.path().join("NormalFolder")).unwrap();

        let plan = Plan::new(
            vec![],
            vec![
                Move::new("VIDEO_TS", "Movies/VIDEO_TS", "Movies"),
                Move::new("NormalFolder", "Archive/NormalFolder", "Archive"),
            ],
        );
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert_eq!(validated.moves.len(), 1);
        assert_eq!(validated.moves[0].old_rel, "VIDEO_TS");
    }

    #[test]
    fn test_bundle_internals_rejected() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Edit.fcpbundle/media/clip.mov");
        touch(dir.path(), "loose.mov");

        let plan = Plan::new(
            vec!["Edit.fcpbundle/Extra".to_string(), "Videos".to_string()],
            vec![
                Move::new("Edit.fcpbundle/media/clip.mov", "Videos/clip.mov", "v"),
                Move::new("loose.mov", "Edit.fcpbundle/loose.mov", "v"),
            ],
        );
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert!(validated.moves.is_empty());
        assert_eq!(validated.folders_to_create, vec!["Videos"]);
        assert_eq!(validated.warnings.len(), 3);
    }

    #[test]
    fn test_renames_noops_and_duplicates() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/x.txt");

        let plan = Plan::new(
            vec![],
            vec![
                Move::new("a/x.txt", "a/y.txt", "rename"),
                Move::new("a/x.txt", "a/x.txt", "noop"),
                Move::new("a\\x.txt", "Docs/x.txt", "docs"),
                Move::new("a/x.txt", "/Docs/x.txt/", "docs"),
            ],
        );
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert_eq!(validated.moves, vec![Move::new("a/x.txt", "Docs/x.txt", "docs")]);
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_missing_source_skipped() {
        let dir = tempdir().unwrap();
        let plan = Plan::new(vec![], vec![Move::new("gone.txt", "Docs/gone.txt", "d")]);
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert!(validated.moves.is_empty());
        assert!(validated.warnings[0].contains("not found"));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.txt");
        let plan = Plan::new(vec![], vec![Move::new("a.txt", "../escape/a.txt", "x")]);
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert!(validated.moves.is_empty());
    }

    #[test]
    fn test_collisions_fail_whole_plan() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/x.mp4");
        touch(dir.path(), "b/x.mp4");
        touch(dir.path(), "c/x.mp4");

        let plan = Plan::new(
            vec![],
            vec![
                Move::new("a/x.mp4", "Movies/x.mp4", "m"),
                Move::new("b/x.mp4", "Movies/x.mp4", "m"),
                Move::new("c/x.mp4", "Movies/x.mp4", "m"),
            ],
        );
        match validate_plan(dir.path(), &plan) {
            Err(EngineError::DestinationCollisions(pairs)) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].first_source, "a/x.mp4");
            }
            other => panic!("expected collisions, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_source_rejected() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "real.txt");
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();

        let plan = Plan::new(vec![], vec![Move::new("link.txt", "Docs/link.txt", "d")]);
        let validated = validate_plan(dir.path(), &plan).unwrap();
        assert!(validated.moves.is_empty());
        assert!(validated.warnings[0].contains("symlink"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_parent_cannot_pull_outside_files_in() {
        let dir = tempdir().unwrap();
        let private = tempdir().unwrap();
        touch(private.path(), "secret.txt");
        touch(dir.path(), "Docs/keep.txt");
        std::os::unix::fs::symlink(private.path(), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(private.path(), dir.path().join("Out")).unwrap();
        touch(dir.path(), "inbox/a.txt");

        let plan = Plan::new(
            vec![],
            vec![
                Move::new("link/secret.txt", "Docs/secret.txt", "d"),
                Move::new("inbox/a.txt", "Out/a.txt", "d"),
            ],
        );
        let validated = validate_plan(dir.path(), &plan).unwrap();

        assert!(validated.moves.is_empty());
        assert_eq!(validated.warnings.len(), 2);
        assert!(validated.warnings.iter().all(|w| w.contains("symlink")));
    }
}
