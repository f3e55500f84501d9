// ABOUTME: HTTP implementation of TrackerClient on top of reqwest and the Jira REST API
// ABOUTME: Handles basic auth, endpoint construction, status mapping and pagination

use async_trait::async_trait;
use http::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::Result;
use crate::builder::JiraClientConfig;
use crate::constants::{self, limits, paths};
use crate::error::JiraError;
use crate::tracker::TrackerClient;
use crate::types::{
    FieldDescriptor, Issue, IssueUpdate, RawCreatedIssue, RawField, RawIssue, RawSearchPage,
    RawSprintPage, RawTransitions, SearchPage, SearchRequest, Sprint, Transition, User,
};

pub struct JiraClient {
    client: reqwest::Client,
    base_url: Url,
    email: String,
    api_token: SecretString,
}

impl JiraClient {
    pub fn from_config(config: JiraClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            JiraError::Configuration(format!("Invalid server URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(JiraError::Configuration(format!(
                "Server URL '{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .timeout(config.timeout);
        if let Some(proxy_url) = &config.proxy {
            builder = builder.proxy(Self::create_proxy(proxy_url)?);
        }
        let client = builder
            .build()
            .map_err(|e| JiraError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            email: config.email,
            api_token: config.api_token,
        })
    }

    fn endpoint(&self, base: &[&str], rest: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| JiraError::Configuration("Server URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(base)
            .extend(rest);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .header(http::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "request failed");
        Err(JiraError::from_status(status, &body, retry_after))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl TrackerClient for JiraClient {
    #[instrument(skip(self, request), fields(jql = %request.jql))]
    async fn search(
        &self,
        request: &SearchRequest,
        page_token: Option<&str>,
    ) -> Result<SearchPage> {
        let url = self.endpoint(paths::SEARCH_JQL, &[])?;
        let mut body = json!({
            "jql": request.jql,
            "maxResults": request.page_size,
            "fields": request.fields,
        });
        if let Some(token) = page_token {
            body["nextPageToken"] = Value::String(token.to_string());
        }

        let raw: RawSearchPage = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self))]
    async fn get_issue(&self, issue_key: &str) -> Result<Issue> {
        let url = self.endpoint(paths::ISSUE, &[issue_key])?;
        let raw: RawIssue = self.send_json(self.request(Method::GET, url)).await?;
        Ok(raw.into())
    }

    #[instrument(skip(self))]
    async fn field_metadata(&self) -> Result<Vec<FieldDescriptor>> {
        let url = self.endpoint(paths::FIELDS, &[])?;
        let raw: Vec<RawField> = self.send_json(self.request(Method::GET, url)).await?;
        Ok(raw.into_iter().map(FieldDescriptor::from).collect())
    }

    #[instrument(skip(self, update))]
    async fn update_fields(&self, issue_key: &str, update: &IssueUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(paths::ISSUE, &[issue_key])?;
        self.send(self.request(Method::PUT, url).json(&update.to_body()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn transitions(&self, issue_key: &str) -> Result<Vec<Transition>> {
        let url = self.endpoint(paths::ISSUE, &[issue_key, "transitions"])?;
        let raw: RawTransitions = self.send_json(self.request(Method::GET, url)).await?;
        Ok(raw.transitions.into_iter().map(Transition::from).collect())
    }

    #[instrument(skip(self))]
    async fn apply_transition(
        &self,
        issue_key: &str,
        transition_id: &str,
        resolution: Option<&str>,
    ) -> Result<()> {
        let url = self.endpoint(paths::ISSUE, &[issue_key, "transitions"])?;
        let mut body = json!({ "transition": { "id": transition_id } });
        if let Some(resolution) = resolution {
            body["fields"] = json!({ "resolution": { "name": resolution } });
        }
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self, body))]
    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<()> {
        let url = self.endpoint(paths::ISSUE, &[issue_key, "comment"])?;
        self.send(self.request(Method::POST, url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
        let url = self.endpoint(paths::ISSUE, &[issue_key, "watchers"])?;
        self.send(self.request(Method::POST, url).json(&account_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
        let mut url = self.endpoint(paths::ISSUE, &[issue_key, "watchers"])?;
        url.query_pairs_mut().append_pair("accountId", account_id);
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self, comment))]
    async fn log_work(
        &self,
        issue_key: &str,
        time_spent: &str,
        comment: Option<&str>,
    ) -> Result<()> {
        let url = self.endpoint(paths::ISSUE, &[issue_key, "worklog"])?;
        let mut body = json!({ "timeSpent": time_spent });
        if let Some(comment) = comment {
            body["comment"] = Value::String(comment.to_string());
        }
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self, fields))]
    async fn create_issue(&self, fields: &Map<String, Value>) -> Result<String> {
        let url = self.endpoint(paths::ISSUE, &[])?;
        let created: RawCreatedIssue = self
            .send_json(
                self.request(Method::POST, url)
                    .json(&json!({ "fields": fields })),
            )
            .await?;
        Ok(created.key)
    }

    #[instrument(skip(self))]
    async fn delete_issue(&self, issue_key: &str) -> Result<()> {
        let url = self.endpoint(paths::ISSUE, &[issue_key])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_link(
        &self,
        inward_key: &str,
        outward_key: &str,
        link_type: &str,
    ) -> Result<()> {
        let url = self.endpoint(paths::ISSUE_LINK, &[])?;
        let body = json!({
            "type": { "name": link_type },
            "inwardIssue": { "key": inward_key },
            "outwardIssue": { "key": outward_key },
        });
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn myself(&self) -> Result<User> {
        let url = self.endpoint(paths::MYSELF, &[])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self))]
    async fn sprints(&self, board_id: u64, state: Option<&str>) -> Result<Vec<Sprint>> {
        let board = board_id.to_string();
        let mut sprints = Vec::new();

        loop {
            let mut url = self.endpoint(paths::AGILE_BOARD, &[&board, "sprint"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("startAt", &sprints.len().to_string());
                query.append_pair("maxResults", &limits::SPRINT_PAGE_SIZE.to_string());
                if let Some(state) = state {
                    query.append_pair("state", state);
                }
            }

            let page: RawSprintPage = self.send_json(self.request(Method::GET, url)).await?;
            let fetched = page.values.len();
            sprints.extend(page.values);
            if fetched == 0 || page.is_last.unwrap_or(true) {
                break;
            }
        }

        Ok(sprints)
    }

    #[instrument(skip(self))]
    async fn create_sprint(
        &self,
        board_id: u64,
        name: &str,
        start_date: Option<&str>,
    ) -> Result<Sprint> {
        let url = self.endpoint(paths::AGILE_SPRINT, &[])?;
        let mut body = json!({ "name": name, "originBoardId": board_id });
        if let Some(start_date) = start_date {
            body["startDate"] = Value::String(start_date.to_string());
        }
        self.send_json(self.request(Method::POST, url).json(&body))
            .await
    }

    #[instrument(skip(self, issue_keys), fields(count = issue_keys.len()))]
    async fn add_to_sprint(&self, sprint_id: u64, issue_keys: &[String]) -> Result<()> {
        let sprint = sprint_id.to_string();
        for chunk in issue_keys.chunks(limits::SPRINT_ISSUE_CHUNK) {
            let url = self.endpoint(paths::AGILE_SPRINT, &[&sprint, "issue"])?;
            self.send(
                self.request(Method::POST, url)
                    .json(&json!({ "issues": chunk })),
            )
            .await?;
        }
        Ok(())
    }
}
