//! Boundary for text produced by the external decision-maker.
//!
//! Oracle output is untrusted: it may be wrapped in prose or Markdown, cut off
//! mid-object, or contain entries with missing fields. Everything here turns
//! that text into typed values or a [`EngineError::PlanParse`].

pub mod json_parser;

pub use json_parser::{extract, extract_json, salvage_truncated, Extracted};

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::models::{Move, Plan};
use crate::rules::{OrganizationRule, RuleSet};

fn parse_value(text: &str) -> Result<Value> {
    extract_json::<Value>(text).map_err(EngineError::PlanParse)
}

/// Pull the array stored under `key`; a missing or null key is an empty list.
fn entries<'a>(value: &'a Value, key: &str) -> Result<&'a [Value]> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(EngineError::PlanParse(format!(
            "'{}' must be a list, got {}",
            key, other
        ))),
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.is_empty())
}

/// Parse an oracle rules response (`{"rules": [...]}`) into an ordered,
/// validated rule set.
///
/// A rule that does not deserialize or fails validation rejects the whole
/// response. Empty objects left behind by truncation salvage are dropped.
///
/// When the text was truncated, the final rule entry is dropped, as is any
/// entry without a `target_template`: a rule cut off mid-criteria would
/// otherwise match more records than its author intended.
pub fn parse_rules(text: &str) -> Result<RuleSet> {
    let Extracted { value, salvaged } = extract::<Value>(text).map_err(EngineError::PlanParse)?;
    let mut items = entries(&value, "rules")?;
    if salvaged {
        if let Some((last, complete)) = items.split_last() {
            if !is_empty_object(last) {
                tracing::warn!(
                    name = last.get("name").and_then(serde_json::Value::as_str).unwrap_or("Unnamed rule"),
                    "Dropping rule cut off by truncation"
                );
            }
            items = complete;
        }
    }

    let mut rules = Vec::new();
    for (index, entry) in items.iter().enumerate() {
        if is_empty_object(entry) {
            tracing::warn!(index, "Dropping empty rule entry");
            continue;
        }
        if salvaged && entry.get("target_template").is_none() {
            tracing::warn!(index, "Dropping salvaged rule without a target template");
            continue;
        }
        let rule: OrganizationRule =
            serde_json::from_value(entry.clone()).map_err(|e| EngineError::InvalidRule {
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unnamed rule")
                    .to_string(),
                reason: e.to_string(),
            })?;
        rules.push(rule);
    }

    let rule_set = RuleSet::validated(rules)?;
    tracing::info!(count = rule_set.len(), "Parsed oracle rules");
    Ok(rule_set)
}

/// Parse an explicit-move plan (`{"folders_to_create": [...], "moves": [...]}`).
///
/// Moves are read one by one: entries missing `old_rel`/`new_rel` are skipped
/// with a warning, and no-op moves are filtered.
pub fn parse_plan(text: &str) -> Result<Plan> {
    let value = parse_value(text)?;

    let folders_to_create: Vec<String> = entries(&value, "folders_to_create")?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    let mut moves = Vec::new();
    for (index, entry) in entries(&value, "moves")?.iter().enumerate() {
        match serde_json::from_value::<Move>(entry.clone()) {
            Ok(mv) => moves.push(mv),
            Err(e) => tracing::warn!(index, error = %e, "Skipping malformed move entry"),
        }
    }

    let mut plan = Plan::new(folders_to_create, moves).without_noops();
    plan.root = value.get("root").and_then(Value::as_str).map(str::to_string);

    tracing::info!(
        folders = plan.folders_to_create.len(),
        moves = plan.moves.len(),
        "Parsed explicit-move plan"
    );
    Ok(plan)
}
