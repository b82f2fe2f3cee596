use serde::{Deserialize, Serialize};

use crate::rules::OrganizationRule;

fn default_reason() -> String {
    "No reason provided".to_string()
}

/// A single relocation, relative to the plan root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub old_rel: String,
    pub new_rel: String,
    #[serde(default = "default_reason")]
    pub reason: String,
}

impl Move {
    pub fn new(old_rel: impl Into<String>, new_rel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            old_rel: old_rel.into(),
            new_rel: new_rel.into(),
            reason: reason.into(),
        }
    }

    /// The move that reverses this one
    pub fn inverse(&self) -> Self {
        Self {
            old_rel: self.new_rel.clone(),
            new_rel: self.old_rel.clone(),
            reason: format!("Undo: {}", self.reason),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old_rel == self.new_rel
    }
}

/// Folders to create plus the ordered moves to perform.
///
/// This is also the single-document persisted form. Oracle output with
/// missing fields deserializes to empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default)]
    pub folders_to_create: Vec<String>,
    #[serde(default)]
    pub moves: Vec<Move>,
    /// Rules the moves were generated from, for provenance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<OrganizationRule>,
}

impl Plan {
    pub fn new(folders_to_create: Vec<String>, moves: Vec<Move>) -> Self {
        Self {
            root: None,
            folders_to_create,
            moves,
            rules: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.folders_to_create.is_empty()
    }

    /// Drop moves whose source and destination are textually identical
    pub fn without_noops(mut self) -> Self {
        self.moves.retain(|m| m.old_rel.trim() != m.new_rel.trim());
        self
    }
}

/// First line of a line-delimited plan or undo stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamHeader {
    PlanHeader {
        #[serde(default)]
        root: String,
        #[serde(default)]
        folders_to_create: Vec<String>,
        #[serde(default)]
        rules: Vec<OrganizationRule>,
    },
    UndoHeader {
        root: String,
        created_at: String,
        #[serde(default)]
        run_id: String,
    },
}

impl StreamHeader {
    pub fn root(&self) -> &str {
        match self {
            StreamHeader::PlanHeader { root, .. } | StreamHeader::UndoHeader { root, .. } => root,
        }
    }

    pub fn folders_to_create(&self) -> &[String] {
        match self {
            StreamHeader::PlanHeader {
                folders_to_create, ..
            } => folders_to_create,
            StreamHeader::UndoHeader { .. } => &[],
        }
    }

    pub fn is_undo(&self) -> bool {
        matches!(self, StreamHeader::UndoHeader { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_swaps_paths() {
        let mv = Move::new("a/x.txt", "b/x.txt", "Docs");
        let inv = mv.inverse();
        assert_eq!(inv.old_rel, "b/x.txt");
        assert_eq!(inv.new_rel, "a/x.txt");
        assert!(inv.reason.contains("Docs"));
    }

    #[test]
    fn test_plan_defaults_from_partial_json() {
        let plan: Plan = serde_json::from_str(r#"{"moves": [{"old_rel": "a", "new_rel": "b/a"}]}"#).unwrap();
        assert!(plan.folders_to_create.is_empty());
        assert_eq!(plan.moves[0].reason, "No reason provided");
    }

    #[test]
    fn test_without_noops() {
        let plan = Plan::new(
            vec![],
            vec![Move::new("a.txt", "a.txt", "x"), Move::new("a.txt", "d/a.txt", "x")],
        )
        .without_noops();
        assert_eq!(plan.moves.len(), 1);
    }

    #[test]
    fn test_header_tagging() {
        let line = r#"{"type":"undo_header","root":"/mnt/hdd","created_at":"2024-01-01T00:00:00"}"#;
        let header: StreamHeader = serde_json::from_str(line).unwrap();
        assert!(header.is_undo());
        assert_eq!(header.root(), "/mnt/hdd");

        let plan_line = serde_json::to_string(&StreamHeader::PlanHeader {
            root: "/r".to_string(),
            folders_to_create: vec!["A".to_string()],
            rules: vec![],
        })
        .unwrap();
        assert!(plan_line.contains(r#""type":"plan_header""#));
    }
}
