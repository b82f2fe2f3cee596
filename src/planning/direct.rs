//! Explicit-move plans supplied directly by the oracle, bypassing rules.

use crate::error::Result;
use crate::models::Plan;
use crate::oracle::parse_plan;
use crate::security::{sanitize_destination, sanitize_segment, PathValidator};

/// Build a plan from oracle text of the shape
/// `{"folders_to_create": [...], "moves": [{"old_rel", "new_rel", "reason"}]}`.
///
/// Destination folders get the same sanitization rule-rendered paths get;
/// the destination filename is left untouched. Moves that become no-ops
/// after sanitization are dropped. Destinations with `..` segments are not
/// sanitized, so the validator refuses them with a warning.
pub fn direct_plan(text: &str) -> Result<Plan> {
    let mut plan = parse_plan(text)?;

    for mv in &mut plan.moves {
        let unified = mv.new_rel.replace('\\', "/");
        if unified.split('/').any(|segment| segment.trim() == "..") {
            // Left as-is so validation rejects it visibly
            tracing::warn!(new_rel = %mv.new_rel, "Oracle destination uses parent traversal");
            continue;
        }
        let trimmed = unified.trim_matches('/');
        let name = PathValidator::name_of(trimmed).to_string();
        mv.new_rel = sanitize_destination(trimmed, &name);
    }

    plan.folders_to_create = plan
        .folders_to_create
        .iter()
        .map(|folder| {
            folder
                .replace('\\', "/")
                .split('/')
                .filter_map(sanitize_segment)
                .collect::<Vec<_>>()
                .join("/")
        })
        .filter(|folder| !folder.is_empty())
        .collect();

    Ok(plan.without_noops())
}
