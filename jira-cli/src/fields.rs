// ABOUTME: Resolves human-readable field names to tracker field ids
// ABOUTME: Field metadata is fetched once per resolver and shared by concurrent callers

use jira_sdk::{FieldDescriptor, Issue, RetryConfig, TrackerClient, retry_with_backoff};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{FieldResolutionError, Result};

static CUSTOM_FIELD_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^customfield_\d+$").expect("invalid custom field id regex"));

pub struct FieldResolver {
    client: Arc<dyn TrackerClient>,
    retry: RetryConfig,
    metadata: OnceCell<Vec<FieldDescriptor>>,
}

/// A field together with its displayed value on one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWithValue {
    #[serde(flatten)]
    pub field: FieldDescriptor,
    pub value: Option<String>,
}

impl FieldResolver {
    pub fn new(client: Arc<dyn TrackerClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
            metadata: OnceCell::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Field metadata, fetched on first use. A failed fetch leaves the cache empty.
    async fn metadata(&self) -> Result<&[FieldDescriptor]> {
        let fields = self
            .metadata
            .get_or_try_init(|| async {
                debug!("Fetching field metadata");
                let fields =
                    retry_with_backoff(&self.retry, || self.client.field_metadata()).await?;
                debug!("Cached {} field descriptors", fields.len());
                Ok::<_, jira_sdk::JiraError>(fields)
            })
            .await?;
        Ok(fields.as_slice())
    }

    /// Resolve a human name (case-insensitive) or a field id to its descriptor
    pub async fn resolve(&self, name_or_id: &str) -> Result<FieldDescriptor> {
        let wanted = name_or_id.trim();
        let fields = self.metadata().await?;

        let folded = wanted.to_lowercase();
        let mut by_name = fields
            .iter()
            .filter(|f| f.human_name.to_lowercase() == folded)
            .peekable();
        if let Some(first) = by_name.peek().copied() {
            let exact = by_name.find(|f| f.human_name == wanted);
            return Ok(exact.unwrap_or(first).clone());
        }

        if let Some(field) = fields.iter().find(|f| f.id == wanted) {
            return Ok(field.clone());
        }

        if CUSTOM_FIELD_ID_REGEX.is_match(wanted) {
            return Ok(FieldDescriptor::new(wanted, wanted, true));
        }

        Err(FieldResolutionError::UnknownField(wanted.to_string()).into())
    }

    /// All known fields sorted by name, optionally only custom ones
    pub async fn descriptors(&self, custom_only: bool) -> Result<Vec<FieldDescriptor>> {
        let mut fields: Vec<FieldDescriptor> = self
            .metadata()
            .await?
            .iter()
            .filter(|f| !custom_only || f.is_custom)
            .cloned()
            .collect();
        fields.sort_by(|a, b| {
            a.human_name
                .to_lowercase()
                .cmp(&b.human_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(fields)
    }

    /// Every known field paired with its value on `issue`; unset fields carry no value
    pub async fn values_for(&self, issue: &Issue, custom_only: bool) -> Result<Vec<FieldWithValue>> {
        Ok(self
            .descriptors(custom_only)
            .await?
            .into_iter()
            .map(|field| {
                let value = issue.field_display(&field.id);
                FieldWithValue { field, value }
            })
            .collect())
    }

    pub async fn name_for(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .metadata()
            .await?
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.human_name.clone()))
    }
}
