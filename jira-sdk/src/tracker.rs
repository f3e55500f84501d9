// ABOUTME: TrackerClient trait describing every remote operation the CLI core relies on
// ABOUTME: Implemented by JiraClient over HTTP and by in-memory mocks in tests

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;
use crate::error::JiraError;
use crate::types::{
    FieldDescriptor, Issue, IssueUpdate, SearchPage, SearchRequest, Sprint, Transition, User,
};

/// Authenticated access to the issue tracker
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Fetch one page of search results. `page_token` is `None` for the first page.
    async fn search(&self, request: &SearchRequest, page_token: Option<&str>)
    -> Result<SearchPage>;

    async fn get_issue(&self, issue_key: &str) -> Result<Issue>;

    async fn field_metadata(&self) -> Result<Vec<FieldDescriptor>>;

    async fn update_fields(&self, issue_key: &str, update: &IssueUpdate) -> Result<()>;

    async fn transitions(&self, issue_key: &str) -> Result<Vec<Transition>>;

    async fn apply_transition(
        &self,
        issue_key: &str,
        transition_id: &str,
        resolution: Option<&str>,
    ) -> Result<()>;

    /// Transition by human name, matched case-insensitively against the
    /// transitions currently available for the issue
    async fn transition(
        &self,
        issue_key: &str,
        transition_name: &str,
        resolution: Option<&str>,
    ) -> Result<()> {
        let available = self.transitions(issue_key).await?;
        let transition = available
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(transition_name))
            .ok_or_else(|| {
                let names: Vec<&str> = available.iter().map(|t| t.name.as_str()).collect();
                JiraError::Validation(format!(
                    "Transition '{}' not found for {} (available: {})",
                    transition_name,
                    issue_key,
                    names.join(", ")
                ))
            })?;

        self.apply_transition(issue_key, &transition.id, resolution)
            .await
    }

    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<()>;

    async fn add_watcher(&self, issue_key: &str, account_id: &str) -> Result<()>;

    async fn remove_watcher(&self, issue_key: &str, account_id: &str) -> Result<()>;

    async fn log_work(&self, issue_key: &str, time_spent: &str, comment: Option<&str>)
    -> Result<()>;

    /// Create an issue and return its key
    async fn create_issue(&self, fields: &Map<String, Value>) -> Result<String>;

    async fn delete_issue(&self, issue_key: &str) -> Result<()>;

    async fn create_link(&self, inward_key: &str, outward_key: &str, link_type: &str)
    -> Result<()>;

    async fn myself(&self) -> Result<User>;

    async fn sprints(&self, board_id: u64, state: Option<&str>) -> Result<Vec<Sprint>>;

    async fn create_sprint(
        &self,
        board_id: u64,
        name: &str,
        start_date: Option<&str>,
    ) -> Result<Sprint>;

    async fn add_to_sprint(&self, sprint_id: u64, issue_keys: &[String]) -> Result<()>;
}
