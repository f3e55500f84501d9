// ABOUTME: Centralized constants for the Jira CLI application
// ABOUTME: Contains search and bulk limits, UI timings, default aliases and status mappings

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Search and bulk execution limits
pub mod limits {
    /// Issues fetched per search page; independent of the bulk batch size
    pub const SEARCH_PAGE_SIZE: u32 = 50;

    /// Upper bound on issues a single bulk job may touch unless raised explicitly
    pub const DEFAULT_MAX_RESULTS: usize = 1000;

    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Batches in flight at once
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Keys shown in the confirmation prompt
    pub const CONFIRMATION_SAMPLE_SIZE: usize = 10;

    /// Default row limit for `list`
    pub const DEFAULT_LIST_LIMIT: usize = 50;

    /// Alias expansion depth before giving up
    pub const MAX_ALIAS_DEPTH: usize = 10;
}

pub mod timeouts {
    /// Progress bar tick interval for smooth animation
    pub const PROGRESS_BAR_TICK_MS: u64 = 80;
}

pub mod ui {
    /// Summary column width in issue tables
    pub const SUMMARY_WIDTH: usize = 60;

    /// Border line length for issue display formatting
    pub const BORDER_LINE_LENGTH: usize = 50;
}

/// Aliases available even without a config file; config entries with the same name win
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("my", r#"list --assignee "currentUser()""#),
    ("todo", r#"list --status "To Do""#),
    ("inprog", r#"list --status "In Progress""#),
    ("done", r#"list --status Done"#),
    ("blocked", r#"list --status Blocked"#),
    ("review", r#"list --status "In Review""#),
    ("recent", r#"list --updated-after -7d"#),
];

/// Human field name used to locate story points when no field id is configured
pub const STORY_POINTS_FIELD_NAME: &str = "Story Points";

/// Shorthand status names accepted by `--status`
pub static STATUS_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("todo", "To Do");
    m.insert("to-do", "To Do");
    m.insert("in-progress", "In Progress");
    m.insert("inprogress", "In Progress");
    m.insert("in_progress", "In Progress");
    m.insert("review", "In Review");
    m.insert("in-review", "In Review");
    m.insert("done", "Done");
    m.insert("closed", "Done");
    m.insert("blocked", "Blocked");
    m
});

/// Canonical status name for a shorthand, or the input unchanged
pub fn canonical_status(status: &str) -> String {
    STATUS_ALIASES
        .get(status.to_ascii_lowercase().as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(limits::SEARCH_PAGE_SIZE, 50);
        assert_eq!(limits::DEFAULT_MAX_RESULTS, 1000);
        assert!(limits::DEFAULT_BATCH_SIZE > 0);
        assert!((4..=8).contains(&limits::DEFAULT_CONCURRENCY));
    }

    #[test]
    fn test_status_aliases() {
        assert_eq!(canonical_status("todo"), "To Do");
        assert_eq!(canonical_status("In-Progress"), "In Progress");
        assert_eq!(canonical_status("Ready for QA"), "Ready for QA");
    }

    #[test]
    fn test_default_aliases_are_unique() {
        let mut names: Vec<&str> = DEFAULT_ALIASES.iter().map(|(name, _)| *name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_ALIASES.len());
    }
}
