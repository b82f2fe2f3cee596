use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use super::criteria::MatchCriteria;
use super::template::render_destination;
use crate::error::EngineError;
use crate::models::FileRecord;

fn default_rule_name() -> String {
    "Unnamed rule".to_string()
}

fn default_template() -> String {
    "{parent}/{original_name}".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A rule mapping matching records to a destination template.
///
/// The rule name doubles as the human-readable reason on every move it
/// produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRule {
    #[serde(default = "default_rule_name")]
    pub name: String,
    #[serde(default, rename = "match")]
    pub criteria: MatchCriteria,
    #[serde(default = "default_template")]
    pub target_template: String,
    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Set on rules synthesized by the catch-all generator rather than
    /// authored by the oracle. Informational only.
    #[serde(default, skip_serializing_if = "is_false")]
    pub generated: bool,
}

impl OrganizationRule {
    pub fn new(
        name: impl Into<String>,
        criteria: MatchCriteria,
        target_template: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            criteria,
            target_template: target_template.into(),
            priority,
            event_name: None,
            generated: false,
        }
    }

    pub fn with_event(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        self.criteria.matches(record)
    }

    /// Render this rule's destination for a record
    pub fn render(&self, record: &FileRecord) -> String {
        render_destination(&self.target_template, self.event_name.as_deref(), record)
    }

    /// Boundary validation for oracle-authored rules
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| EngineError::InvalidRule {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("rule name is empty".to_string()));
        }
        if self.target_template.trim().is_empty() {
            return Err(invalid("target_template is empty".to_string()));
        }
        self.criteria.validate().map_err(invalid)
    }
}

/// Rules in evaluation order: descending priority, ties in input order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<OrganizationRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<OrganizationRule>) -> Self {
        // sort_by_key is stable, which preserves input order on ties
        rules.sort_by_key(|r| Reverse(r.priority));
        Self { rules }
    }

    /// Validate every rule, then order them
    pub fn validated(rules: Vec<OrganizationRule>) -> Result<Self, EngineError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self::new(rules))
    }

    /// Append rules (e.g. synthesized catch-alls) and re-establish ordering.
    /// Appended rules lose ties against existing ones.
    pub fn extend(&mut self, extra: impl IntoIterator<Item = OrganizationRule>) {
        self.rules.extend(extra);
        self.rules.sort_by_key(|r| Reverse(r.priority));
    }

    /// First rule, in evaluation order, whose criteria match
    pub fn first_match(&self, record: &FileRecord) -> Option<&OrganizationRule> {
        self.rules.iter().find(|r| r.matches(record))
    }

    pub fn rules(&self) -> &[OrganizationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
