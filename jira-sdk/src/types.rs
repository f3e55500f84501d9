// ABOUTME: Typed records exchanged with the Jira REST API
// ABOUTME: Raw wire shapes are deserialized here and flattened into CLI-friendly structs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Issue fields requested by default when searching
pub const DEFAULT_SEARCH_FIELDS: &[&str] = &[
    "summary",
    "status",
    "assignee",
    "priority",
    "issuetype",
    "labels",
    "created",
    "updated",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub labels: Vec<String>,
    pub description: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    /// Every field returned by the server, keyed by field id
    #[serde(skip)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Minimal issue, mostly useful for tests and mocks
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: key.clone(),
            key,
            summary: summary.into(),
            status: None,
            assignee: None,
            priority: None,
            issue_type: None,
            labels: Vec::new(),
            description: None,
            created: None,
            updated: None,
            fields: Map::new(),
        }
    }

    /// Numeric value of an arbitrary field, e.g. a story points custom field
    pub fn number_field(&self, field_id: &str) -> Option<f64> {
        match self.fields.get(field_id)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Human-readable value of any field, with lists joined by commas. `None` when unset.
    pub fn field_display(&self, field_id: &str) -> Option<String> {
        display_value(self.fields.get(field_id)?)
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_value).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) => ["value", "name", "displayName", "key"]
            .iter()
            .find_map(|attr| map.get(*attr).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    #[serde(default)]
    id: String,
    key: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

fn nested_str(fields: &Map<String, Value>, field: &str, attr: &str) -> Option<String> {
    fields
        .get(field)?
        .get(attr)?
        .as_str()
        .map(str::to_string)
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        let fields = raw.fields;
        let labels = fields
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Issue {
            id: raw.id,
            key: raw.key,
            summary: fields
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: nested_str(&fields, "status", "name"),
            assignee: nested_str(&fields, "assignee", "displayName"),
            priority: nested_str(&fields, "priority", "name"),
            issue_type: nested_str(&fields, "issuetype", "name"),
            labels,
            // v3 returns rich-text documents here; only plain strings are kept
            description: fields
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            created: fields.get("created").and_then(Value::as_str).map(str::to_string),
            updated: fields.get("updated").and_then(Value::as_str).map(str::to_string),
            fields,
        }
    }
}

/// One search request; pagination is driven separately through page tokens
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub jql: String,
    pub fields: Vec<String>,
    pub page_size: u32,
}

impl SearchRequest {
    pub fn new(jql: impl Into<String>, page_size: u32) -> Self {
        Self {
            jql: jql.into(),
            fields: DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
            page_size,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub issues: Vec<Issue>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSearchPage {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

impl From<RawSearchPage> for SearchPage {
    fn from(raw: RawSearchPage) -> Self {
        let next_page_token = if raw.is_last == Some(true) {
            None
        } else {
            raw.next_page_token
        };
        SearchPage {
            issues: raw.issues.into_iter().map(Issue::from).collect(),
            next_page_token,
        }
    }
}

/// Field metadata entry as exposed by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub human_name: String,
    pub is_custom: bool,
    /// Schema type reported by the server ("string", "option", "array", "number", ...)
    pub schema_type: Option<String>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, human_name: impl Into<String>, is_custom: bool) -> Self {
        Self {
            id: id.into(),
            human_name: human_name.into(),
            is_custom,
            schema_type: None,
        }
    }

    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawField {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    custom: bool,
    #[serde(default)]
    schema: Option<RawFieldSchema>,
}

#[derive(Debug, Deserialize)]
struct RawFieldSchema {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl From<RawField> for FieldDescriptor {
    fn from(raw: RawField) -> Self {
        FieldDescriptor {
            human_name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            is_custom: raw.custom,
            schema_type: raw.schema.and_then(|schema| schema.kind),
        }
    }
}

/// Field changes for one issue. `fields` replaces values, label additions use the
/// tracker's incremental `update` verbs so current labels are preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub fields: Map<String, Value>,
    pub add_labels: Vec<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.add_labels.is_empty()
    }

    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), Value::Object(self.fields.clone()));
        }
        if !self.add_labels.is_empty() {
            let adds: Vec<Value> = self
                .add_labels
                .iter()
                .map(|label| json!({ "add": label }))
                .collect();
            body.insert("update".to_string(), json!({ "labels": adds }));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    pub to_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransitions {
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransition {
    id: String,
    name: String,
    #[serde(default)]
    to: Option<RawNamed>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: String,
}

impl From<RawTransition> for Transition {
    fn from(raw: RawTransition) -> Self {
        Transition {
            id: raw.id,
            name: raw.name,
            to_status: raw.to.map(|to| to.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSprintPage {
    #[serde(default)]
    pub values: Vec<Sprint>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCreatedIssue {
    pub key: String,
}
