//! Match predicates evaluated against a single record.
//!
//! Matching is pure and looks at one record at a time, so it can run over a
//! record stream of any length. Every specified predicate must hold; an
//! absent predicate always holds.

use serde::{Deserialize, Serialize};

use crate::models::{parse_timestamp, FileRecord};

/// Conjunctive match criteria for an organization rule.
///
/// Unknown keys are rejected at deserialization so a misspelled predicate
/// from the oracle cannot silently widen a rule into a match-everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchCriteria {
    /// Extension allow-list (case-insensitive, leading dot optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_in: Option<Vec<String>>,
    /// Extension deny-list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_not_in: Option<Vec<String>>,
    /// Parent folder name must contain any of these (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name_contains_any: Option<Vec<String>>,
    /// Relative path must contain any of these (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_contains_any: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    /// Inclusive lower timestamp bound (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    /// Inclusive upper timestamp bound (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
}

impl MatchCriteria {
    /// Criteria that match every record
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_extensions<S: Into<String>>(exts: impl IntoIterator<Item = S>) -> Self {
        Self {
            ext_in: Some(exts.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Evaluate every specified predicate against the record.
    pub fn matches(&self, record: &FileRecord) -> bool {
        let ext = record.normalized_ext();

        if let Some(allowed) = &self.ext_in {
            if !allowed.iter().any(|e| ext_eq(e, &ext)) {
                return false;
            }
        }

        if let Some(denied) = &self.ext_not_in {
            if denied.iter().any(|e| ext_eq(e, &ext)) {
                return false;
            }
        }

        if let Some(patterns) = &self.parent_name_contains_any {
            if !contains_any(record.parent_name(), patterns) {
                return false;
            }
        }

        if let Some(patterns) = &self.path_contains_any {
            if !contains_any(&record.rel_path, patterns) {
                return false;
            }
        }

        if let Some(min) = self.min_size_bytes {
            if record.size_bytes < min {
                return false;
            }
        }
        if let Some(max) = self.max_size_bytes {
            if record.size_bytes > max {
                return false;
            }
        }

        if self.date_start.is_some() || self.date_end.is_some() {
            return self.matches_date_range(record);
        }

        true
    }

    /// Any unparseable bound or missing record timestamp is a non-match.
    fn matches_date_range(&self, record: &FileRecord) -> bool {
        let Some(ts) = record.timestamp() else {
            return false;
        };

        if let Some(start) = &self.date_start {
            match parse_timestamp(start) {
                Some(start) if ts >= start => {}
                _ => return false,
            }
        }
        if let Some(end) = &self.date_end {
            match parse_timestamp(end) {
                Some(end) if ts <= end => {}
                _ => return false,
            }
        }
        true
    }

    /// Structural checks applied when criteria arrive from the oracle.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_size_bytes, self.max_size_bytes) {
            if min > max {
                return Err(format!("min_size_bytes ({}) exceeds max_size_bytes ({})", min, max));
            }
        }

        for (field, list) in [
            ("ext_in", &self.ext_in),
            ("ext_not_in", &self.ext_not_in),
            ("parent_name_contains_any", &self.parent_name_contains_any),
            ("path_contains_any", &self.path_contains_any),
        ] {
            if let Some(values) = list {
                if values.iter().any(|v| v.trim().is_empty()) {
                    return Err(format!("{} contains an empty entry", field));
                }
            }
        }

        for (field, bound) in [("date_start", &self.date_start), ("date_end", &self.date_end)] {
            if let Some(value) = bound {
                if parse_timestamp(value).is_none() {
                    tracing::warn!(field, value = %value, "Unparseable date bound; rule will match nothing by date");
                }
            }
        }

        Ok(())
    }
}

/// Compare a configured extension against a record's normalized extension
fn ext_eq(configured: &str, normalized: &str) -> bool {
    configured
        .trim()
        .trim_start_matches('.')
        .eq_ignore_ascii_case(normalized.trim_start_matches('.'))
}

fn contains_any(haystack: &str, patterns: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    patterns
        .iter()
        .any(|p| haystack.contains(&p.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64, modified: &str) -> FileRecord {
        FileRecord::file(path, size, modified)
    }

    #[test]
    fn test_empty_criteria_match_everything() {
        assert!(MatchCriteria::any().matches(&record("a/b.txt", 0, "")));
        assert!(MatchCriteria::any().matches(&FileRecord::bundle("VIDEO_TS", 0, "")));
    }

    #[test]
    fn test_extension_normalization() {
        let criteria = MatchCriteria::with_extensions(["JPG", ".png"]);
        assert!(criteria.matches(&record("x/IMG.jpg", 1, "")));
        assert!(criteria.matches(&record("x/shot.PNG", 1, "")));
        assert!(!criteria.matches(&record("x/clip.mp4", 1, "")));
    }

    #[test]
    fn test_extension_deny_list() {
        let criteria = MatchCriteria {
            ext_not_in: Some(vec!["tmp".to_string()]),
            ..MatchCriteria::default()
        };
        assert!(!criteria.matches(&record("x/a.TMP", 1, "")));
        assert!(criteria.matches(&record("x/a.txt", 1, "")));
    }

    #[test]
    fn test_parent_and_path_substrings() {
        let criteria = MatchCriteria {
            parent_name_contains_any: Some(vec!["vacation".to_string()]),
            path_contains_any: Some(vec!["2019".to_string()]),
            ..MatchCriteria::default()
        };
        assert!(criteria.matches(&record("2019/Summer Vacation/a.jpg", 1, "")));
        assert!(!criteria.matches(&record("2020/Summer Vacation/a.jpg", 1, "")));
        assert!(!criteria.matches(&record("2019/Work/a.jpg", 1, "")));
    }

    #[test]
    fn test_size_bounds() {
        let criteria = MatchCriteria {
            min_size_bytes: Some(10),
            max_size_bytes: Some(100),
            ..MatchCriteria::default()
        };
        assert!(criteria.matches(&record("a", 10, "")));
        assert!(criteria.matches(&record("a", 100, "")));
        assert!(!criteria.matches(&record("a", 9, "")));
        assert!(!criteria.matches(&record("a", 101, "")));
    }

    #[test]
    fn test_date_range_matching() {
        let criteria = MatchCriteria {
            date_start: Some("2023-12-24T00:00:00".to_string()),
            date_end: Some("2023-12-26T23:59:59".to_string()),
            ..MatchCriteria::default()
        };
        assert!(criteria.matches(&record("a.jpg", 1, "2023-12-25T12:00:00")));
        assert!(!criteria.matches(&record("b.jpg", 1, "2023-12-20T12:00:00")));
    }

    #[test]
    fn test_date_range_prefers_capture_time() {
        let criteria = MatchCriteria {
            date_start: Some("2023-12-24".to_string()),
            date_end: Some("2023-12-27".to_string()),
            ..MatchCriteria::default()
        };
        let rec = record("a.jpg", 1, "2024-03-01T00:00:00").with_date_taken("2023-12-25T09:00:00");
        assert!(criteria.matches(&rec));
    }

    #[test]
    fn test_unparseable_bound_is_non_matching() {
        let criteria = MatchCriteria {
            date_start: Some("last christmas".to_string()),
            ..MatchCriteria::default()
        };
        assert!(!criteria.matches(&record("a.jpg", 1, "2023-12-25T12:00:00")));

        let bounded = MatchCriteria {
            date_start: Some("2023-01-01".to_string()),
            ..MatchCriteria::default()
        };
        assert!(!bounded.matches(&record("a.jpg", 1, "")));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<MatchCriteria, _> = serde_json::from_str(r#"{"ext_include": ["jpg"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        let bad = MatchCriteria {
            min_size_bytes: Some(10),
            max_size_bytes: Some(1),
            ..MatchCriteria::default()
        };
        assert!(bad.validate().is_err());

        let empty_ext = MatchCriteria::with_extensions([""]);
        assert!(empty_ext.validate().is_err());

        assert!(MatchCriteria::with_extensions(["jpg"]).validate().is_ok());
    }
}
