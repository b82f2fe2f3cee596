//! Rule coverage checks and catch-all rule synthesis.
//!
//! Coverage is a separate, non-mutating pass. Record streams are single-pass,
//! so callers needing both coverage and generation must either buffer the
//! records or read the source twice.

use std::collections::BTreeSet;

use super::criteria::MatchCriteria;
use super::rule::{OrganizationRule, RuleSet};
use crate::models::FileRecord;

/// Result of checking a record stream against a rule set
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub total_records: usize,
    pub matched: usize,
    /// Records no rule matched
    pub unmatched: Vec<FileRecord>,
}

impl CoverageReport {
    /// Percentage (0-100) of records matched by at least one rule
    pub fn coverage_pct(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total_records as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Count how many records match at least one rule and collect the rest.
pub fn check_coverage<I>(records: I, rules: &RuleSet) -> CoverageReport
where
    I: IntoIterator<Item = FileRecord>,
{
    let mut report = CoverageReport::default();

    for record in records {
        report.total_records += 1;
        if record.rel_path.trim().is_empty() {
            continue;
        }
        if rules.first_match(&record).is_some() {
            report.matched += 1;
        } else {
            report.unmatched.push(record);
        }
    }

    tracing::info!(
        total = report.total_records,
        matched = report.matched,
        unmatched = report.unmatched.len(),
        "Rule coverage: {:.1}%",
        report.coverage_pct()
    );

    report
}

/// Synthesize lowest-priority rules covering `unmatched`.
///
/// One rule per extension (priority 0), plus a final match-everything rule
/// (priority -1) for extensionless files and bundles. Output order is
/// deterministic.
pub fn catch_all_rules(unmatched: &[FileRecord]) -> Vec<OrganizationRule> {
    if unmatched.is_empty() {
        return Vec::new();
    }

    let extensions: BTreeSet<String> = unmatched
        .iter()
        .map(FileRecord::normalized_ext)
        .filter(|ext| !ext.is_empty())
        .collect();

    let mut rules: Vec<OrganizationRule> = extensions
        .into_iter()
        .map(|ext| {
            let name = format!("Auto-Generated: {} Files", ext.trim_start_matches('.').to_uppercase());
            let mut rule = OrganizationRule::new(
                name,
                MatchCriteria::with_extensions([ext]),
                "{year} - Misc/{type}/{original_name}",
                0,
            )
            .with_event("Misc");
            rule.generated = true;
            rule
        })
        .collect();

    let mut fallback = OrganizationRule::new(
        "Auto-Generated: Catch-All (Everything Else)",
        MatchCriteria::any(),
        "{year} - Misc/Misc/{original_name}",
        -1,
    )
    .with_event("Misc");
    fallback.generated = true;
    rules.push(fallback);

    rules
}
