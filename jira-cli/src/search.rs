// ABOUTME: Paginated issue search used by the list and velocity commands
// ABOUTME: Walks page tokens until the requested limit is reached or the server runs out

use jira_sdk::{Issue, JiraError, RetryConfig, SearchRequest, TrackerClient, retry_with_backoff};
use log::debug;

use crate::constants::limits;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub jql: String,
    pub limit: usize,
    /// Fields fetched in addition to the default summary columns
    pub extra_fields: Vec<String>,
}

impl SearchOptions {
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            limit: limits::DEFAULT_LIST_LIMIT,
            extra_fields: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.extra_fields.push(field.into());
        self
    }

    fn request(&self) -> SearchRequest {
        let page_size = self.limit.clamp(1, limits::SEARCH_PAGE_SIZE as usize) as u32;
        self.extra_fields
            .iter()
            .fold(SearchRequest::new(self.jql.clone(), page_size), |request, field| {
                request.with_field(field.clone())
            })
    }
}

/// Fetch up to `options.limit` issues, following page tokens
pub async fn search_issues(
    client: &dyn TrackerClient,
    options: &SearchOptions,
    retry: &RetryConfig,
) -> Result<Vec<Issue>> {
    let request = options.request();
    let mut issues: Vec<Issue> = Vec::new();
    let mut page_token: Option<String> = None;

    while issues.len() < options.limit {
        let token = page_token.as_deref();
        let page = retry_with_backoff(retry, || client.search(&request, token)).await?;
        debug!("Search page returned {} issues", page.issues.len());
        issues.extend(page.issues);

        match page.next_page_token {
            Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                return Err(JiraError::InvalidResponse(
                    "search returned the same page token twice".to_string(),
                )
                .into());
            }
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    issues.truncate(options.limit);
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTracker;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_search_stops_at_limit() {
        let tracker = MockTracker::new().with_issues("DATA", 120);
        let options = SearchOptions::new("project = DATA").with_limit(60);

        let issues = search_issues(&tracker, &options, &RetryConfig::immediate(1))
            .await
            .unwrap();

        assert_eq!(issues.len(), 60);
        assert_eq!(issues[59].key, "DATA-60");
        assert_eq!(tracker.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_returns_everything_below_limit() {
        let tracker = MockTracker::new().with_issues("DATA", 7);
        let options = SearchOptions::new("project = DATA").with_limit(50);

        let issues = search_issues(&tracker, &options, &RetryConfig::immediate(1))
            .await
            .unwrap();

        assert_eq!(issues.len(), 7);
        assert_eq!(tracker.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_retries_transient_failure() {
        let tracker = MockTracker::new()
            .with_issues("DATA", 3)
            .fail_search_once(JiraError::Network("connection reset".to_string()));
        let options = SearchOptions::new("project = DATA");

        let issues = search_issues(&tracker, &options, &RetryConfig::immediate(3))
            .await
            .unwrap();

        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_request_includes_extra_fields() {
        let request = SearchOptions::new("project = DATA")
            .with_limit(10)
            .with_field("customfield_10016")
            .request();

        assert_eq!(request.page_size, 10);
        assert!(request.fields.contains(&"customfield_10016".to_string()));
    }
}
