// ABOUTME: Centralized constants for the Jira SDK
// ABOUTME: Contains retry configuration, timeouts, API paths, and error handling constants

/// Retry configuration constants
pub mod retry {
    use std::time::Duration;

    /// Maximum number of attempts, including the first one
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Initial delay before first retry
    pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

    /// Maximum delay between retries
    pub const MAX_DELAY: Duration = Duration::from_secs(10);

    /// Backoff multiplier for exponential backoff
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

/// HTTP and request timeouts
pub mod timeouts {
    use std::time::Duration;

    /// Default timeout for HTTP requests
    pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Jira REST API paths, relative to the server base URL
pub mod paths {
    pub const SEARCH_JQL: &[&str] = &["rest", "api", "3", "search", "jql"];
    pub const FIELDS: &[&str] = &["rest", "api", "3", "field"];
    pub const ISSUE: &[&str] = &["rest", "api", "2", "issue"];
    pub const ISSUE_LINK: &[&str] = &["rest", "api", "2", "issueLink"];
    pub const MYSELF: &[&str] = &["rest", "api", "2", "myself"];
    pub const AGILE_BOARD: &[&str] = &["rest", "agile", "1.0", "board"];
    pub const AGILE_SPRINT: &[&str] = &["rest", "agile", "1.0", "sprint"];
}

/// Request size limits imposed by the Jira API
pub mod limits {
    /// Maximum issues accepted by one "move issues to sprint" call
    pub const SPRINT_ISSUE_CHUNK: usize = 50;

    /// Page size used when listing sprints of a board
    pub const SPRINT_PAGE_SIZE: u32 = 50;
}

/// Error handling constants
pub mod errors {
    /// Server error status code range
    pub const SERVER_ERROR_MIN: u16 = 500;
    pub const SERVER_ERROR_MAX: u16 = 599;
}

pub const USER_AGENT: &str = "jira-cli/0.1.0";
