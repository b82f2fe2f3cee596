//! Declarative organization rules.
//!
//! A rule pairs conjunctive [`MatchCriteria`] with a destination template.
//! Rules are evaluated in descending priority and the first match wins.
//!
//! Example oracle rule:
//! ```json
//! {
//!   "name": "Christmas photos",
//!   "match": {"ext_in": ["jpg", "heic"], "date_start": "2023-12-24", "date_end": "2023-12-27"},
//!   "target_template": "{year} - {event_name}/{type}/{original_name}",
//!   "priority": 10,
//!   "event_name": "Christmas"
//! }
//! ```

pub mod coverage;
pub mod criteria;
pub mod rule;
pub mod template;

pub use coverage::{catch_all_rules, check_coverage, CoverageReport};
pub use criteria::MatchCriteria;
pub use rule::{OrganizationRule, RuleSet};
pub use template::{render_destination, FileKind};
