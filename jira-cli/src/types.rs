// ABOUTME: Display-side grouping of Jira workflow statuses
// ABOUTME: Maps free-form status names onto a few kinds used for coloring tables

use crate::constants::canonical_status;
use std::fmt;

/// Coarse workflow position of a status name. Workflows are per-project, so
/// anything unrecognised is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusKind {
    ToDo,
    InProgress,
    InReview,
    Done,
    Blocked,
    Other(String),
}

impl From<&str> for StatusKind {
    fn from(s: &str) -> Self {
        match canonical_status(s.trim()).as_str() {
            "To Do" | "Backlog" | "Open" => StatusKind::ToDo,
            "In Progress" => StatusKind::InProgress,
            "In Review" => StatusKind::InReview,
            "Done" | "Resolved" => StatusKind::Done,
            "Blocked" => StatusKind::Blocked,
            _ => StatusKind::Other(s.to_string()),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::ToDo => f.write_str("To Do"),
            StatusKind::InProgress => f.write_str("In Progress"),
            StatusKind::InReview => f.write_str("In Review"),
            StatusKind::Done => f.write_str("Done"),
            StatusKind::Blocked => f.write_str("Blocked"),
            StatusKind::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kind_from_str() {
        assert_eq!(StatusKind::from("To Do"), StatusKind::ToDo);
        assert_eq!(StatusKind::from("todo"), StatusKind::ToDo);
        assert_eq!(StatusKind::from("Backlog"), StatusKind::ToDo);
        assert_eq!(StatusKind::from("In Progress"), StatusKind::InProgress);
        assert_eq!(StatusKind::from("closed"), StatusKind::Done);
        assert_eq!(
            StatusKind::from("Ready for QA"),
            StatusKind::Other("Ready for QA".to_string())
        );
    }

    #[test]
    fn test_status_kind_display() {
        assert_eq!(StatusKind::InReview.to_string(), "In Review");
        assert_eq!(StatusKind::Other("Triage".to_string()).to_string(), "Triage");
    }
}
