// ABOUTME: In-memory TrackerClient used by engine unit tests
// ABOUTME: Serves paged search results and scripts per-issue failures for mutations

use async_trait::async_trait;
use jira_sdk::{
    FieldDescriptor, Issue, IssueUpdate, JiraError, SearchPage, SearchRequest, Sprint,
    TrackerClient, Transition, User,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::bulk::CancellationFlag;

type Result<T> = std::result::Result<T, JiraError>;

#[derive(Default)]
pub struct MockTracker {
    issues: Vec<Issue>,
    fields: Vec<FieldDescriptor>,
    field_delay: Option<Duration>,
    field_failure: Mutex<Option<JiraError>>,
    search_failures: Mutex<VecDeque<JiraError>>,
    always_fail: HashMap<String, JiraError>,
    delays: HashMap<String, Duration>,
    scripted_failures: Mutex<HashMap<String, VecDeque<JiraError>>>,
    cancel_after: Option<(usize, CancellationFlag)>,
    pub field_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub attempts: Mutex<HashMap<String, u32>>,
    /// Successful mutations as `(issue key, operation)`
    pub applied: Mutex<Vec<(String, String)>>,
    pub created: Mutex<Vec<Map<String, Value>>>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` issues keyed `<prefix>-1` .. `<prefix>-<count>`
    pub fn with_issues(mut self, prefix: &str, count: usize) -> Self {
        self.issues = (1..=count)
            .map(|n| Issue::new(format!("{prefix}-{n}"), format!("Issue {n}")))
            .collect();
        self
    }

    pub fn with_issue_list(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field_delay(mut self, delay: Duration) -> Self {
        self.field_delay = Some(delay);
        self
    }

    pub fn fail_field_metadata_once(self, error: JiraError) -> Self {
        *self.field_failure.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_search_once(self, error: JiraError) -> Self {
        self.search_failures.lock().unwrap().push_back(error);
        self
    }

    /// Every mutation of `key` fails with `error`
    pub fn fail_always(mut self, key: &str, error: JiraError) -> Self {
        self.always_fail.insert(key.to_string(), error);
        self
    }

    /// The next `times` mutations of `key` fail with `error`
    pub fn fail_times(self, key: &str, times: usize, error: JiraError) -> Self {
        self.scripted_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), std::iter::repeat_n(error, times).collect());
        self
    }

    /// Mutations of `key` wait `delay` before completing
    pub fn with_delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    /// Trip `flag` once `mutations` mutations have succeeded
    pub fn cancel_after(mut self, mutations: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((mutations, flag));
        self
    }

    pub fn attempts_for(&self, key: &str) -> u32 {
        self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn applied_keys(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    async fn mutate(&self, key: &str, operation: String) -> Result<()> {
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;

        if let Some(error) = self.always_fail.get(key) {
            return Err(error.clone());
        }
        if let Some(error) = self
            .scripted_failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let mut applied = self.applied.lock().unwrap();
        applied.push((key.to_string(), operation));
        if let Some((threshold, flag)) = &self.cancel_after {
            if applied.len() >= *threshold {
                flag.cancel();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerClient for MockTracker {
    async fn search(&self, request: &SearchRequest, page_token: Option<&str>) -> Result<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.search_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + request.page_size as usize).min(self.issues.len());
        let issues = self.issues[start.min(end)..end].to_vec();
        let next_page_token = (end < self.issues.len()).then(|| end.to_string());
        Ok(SearchPage {
            issues,
            next_page_token,
        })
    }

    async fn get_issue(&self, issue_key: &str) -> Result<Issue> {
        self.issues
            .iter()
            .find(|issue| issue.key == issue_key)
            .cloned()
            .ok_or_else(|| JiraError::NotFound(format!("Issue {issue_key} does not exist")))
    }

    async fn field_metadata(&self) -> Result<Vec<FieldDescriptor>> {
        self.field_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.field_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.field_failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.fields.clone())
    }

    async fn update_fields(&self, issue_key: &str, update: &IssueUpdate) -> Result<()> {
        let mut names: Vec<&str> = update.fields.keys().map(String::as_str).collect();
        if !update.add_labels.is_empty() {
            names.push("labels+");
        }
        self.mutate(issue_key, format!("update:{}", names.join(","))).await
    }

    async fn transitions(&self, _issue_key: &str) -> Result<Vec<Transition>> {
        Ok(vec![
            Transition {
                id: "11".to_string(),
                name: "To Do".to_string(),
                to_status: Some("To Do".to_string()),
            },
            Transition {
                id: "31".to_string(),
                name: "Done".to_string(),
                to_status: Some("Done".to_string()),
            },
        ])
    }

    async fn apply_transition(
        &self,
        issue_key: &str,
        transition_id: &str,
        _resolution: Option<&str>,
    ) -> Result<()> {
        self.mutate(issue_key, format!("transition:{transition_id}")).await
    }

    async fn add_comment(&self, issue_key: &str, _body: &str) -> Result<()> {
        self.mutate(issue_key, "comment".to_string()).await
    }

    async fn add_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
        self.mutate(issue_key, format!("watch:{account_id}")).await
    }

    async fn remove_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
        self.mutate(issue_key, format!("unwatch:{account_id}")).await
    }

    async fn log_work(&self, issue_key: &str, time_spent: &str, _comment: Option<&str>) -> Result<()> {
        self.mutate(issue_key, format!("log:{time_spent}")).await
    }

    async fn create_issue(&self, fields: &Map<String, Value>) -> Result<String> {
        let mut created = self.created.lock().unwrap();
        created.push(fields.clone());
        Ok(format!("NEW-{}", created.len()))
    }

    async fn delete_issue(&self, issue_key: &str) -> Result<()> {
        self.mutate(issue_key, "delete".to_string()).await
    }

    async fn create_link(&self, inward_key: &str, outward_key: &str, link_type: &str) -> Result<()> {
        self.mutate(inward_key, format!("link:{link_type}:{outward_key}")).await
    }

    async fn myself(&self) -> Result<User> {
        Ok(User {
            account_id: "acc-me".to_string(),
            display_name: Some("Test User".to_string()),
            email_address: None,
        })
    }

    async fn sprints(&self, _board_id: u64, _state: Option<&str>) -> Result<Vec<Sprint>> {
        Ok(vec![
            Sprint {
                id: 1,
                name: "Sprint 1".to_string(),
                state: Some("closed".to_string()),
                start_date: None,
                end_date: None,
            },
            Sprint {
                id: 2,
                name: "Sprint 2".to_string(),
                state: Some("closed".to_string()),
                start_date: None,
                end_date: None,
            },
        ])
    }

    async fn create_sprint(&self, _board_id: u64, name: &str, start_date: Option<&str>) -> Result<Sprint> {
        Ok(Sprint {
            id: 99,
            name: name.to_string(),
            state: Some("future".to_string()),
            start_date: start_date.map(str::to_string),
            end_date: None,
        })
    }

    async fn add_to_sprint(&self, sprint_id: u64, issue_keys: &[String]) -> Result<()> {
        for key in issue_keys {
            self.mutate(key, format!("sprint:{sprint_id}")).await?;
        }
        Ok(())
    }
}
