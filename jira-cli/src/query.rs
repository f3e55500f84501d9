// ABOUTME: Builds JQL query strings from structured filter options and raw clauses
// ABOUTME: Quotes and escapes every literal so user input cannot alter query structure

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::ops::Range;

use crate::error::QueryError;

/// A whole-value tracker function call such as `currentUser()` or `membersOf("team")`
static FUNCTION_CALL_REGEX: Lazy<Regex> = Lazy::new(|| {
    let arg = r#"(?:"(?:[^"\\]|\\.)*"|[A-Za-z0-9_.+\-:]+)"#;
    Regex::new(&format!(
        r"^[A-Za-z_][A-Za-z0-9_]*\(\s*(?:{arg}(?:\s*,\s*{arg})*)?\s*\)$"
    ))
    .expect("invalid function call regex")
});

static RELATIVE_DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+[wdhm]$").expect("invalid relative date regex"));

static CUSTOM_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^customfield_(\d+)$").expect("invalid custom field regex"));

static ORDER_BY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("invalid order by regex"));

/// Structured filter keys, in the order their clauses are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Project,
    Status,
    IssueType,
    Priority,
    Assignee,
    Reporter,
    Component,
    Labels,
    CreatedAfter,
    UpdatedAfter,
}

impl FilterKey {
    pub const ALL: [FilterKey; 10] = [
        FilterKey::Project,
        FilterKey::Status,
        FilterKey::IssueType,
        FilterKey::Priority,
        FilterKey::Assignee,
        FilterKey::Reporter,
        FilterKey::Component,
        FilterKey::Labels,
        FilterKey::CreatedAfter,
        FilterKey::UpdatedAfter,
    ];

    /// JQL field the clause is written against
    pub fn jql_field(self) -> &'static str {
        match self {
            FilterKey::Project => "project",
            FilterKey::Status => "status",
            FilterKey::IssueType => "issuetype",
            FilterKey::Priority => "priority",
            FilterKey::Assignee => "assignee",
            FilterKey::Reporter => "reporter",
            FilterKey::Component => "component",
            FilterKey::Labels => "labels",
            FilterKey::CreatedAfter => "created",
            FilterKey::UpdatedAfter => "updated",
        }
    }

    fn is_date(self) -> bool {
        matches!(self, FilterKey::CreatedAfter | FilterKey::UpdatedAfter)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKey::Project => "project",
            FilterKey::Status => "status",
            FilterKey::IssueType => "type",
            FilterKey::Priority => "priority",
            FilterKey::Assignee => "assignee",
            FilterKey::Reporter => "reporter",
            FilterKey::Component => "component",
            FilterKey::Labels => "labels",
            FilterKey::CreatedAfter => "created-after",
            FilterKey::UpdatedAfter => "updated-after",
        };
        f.write_str(name)
    }
}

/// Filter criteria for one query. Single-valued keys hold at most one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    pub project: Option<String>,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub component: Option<String>,
    pub labels: Vec<String>,
    pub created_after: Option<String>,
    pub updated_after: Option<String>,
    /// `(field id, value)` pairs, e.g. `("customfield_10016", "5")`
    pub custom_fields: Vec<(String, String)>,
    /// Free-text JQL, wrapped in parentheses when combined
    pub raw: Option<String>,
    pub order_by: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, key: FilterKey) -> Option<&mut Option<String>> {
        match key {
            FilterKey::Project => Some(&mut self.project),
            FilterKey::Status => Some(&mut self.status),
            FilterKey::IssueType => Some(&mut self.issue_type),
            FilterKey::Priority => Some(&mut self.priority),
            FilterKey::Assignee => Some(&mut self.assignee),
            FilterKey::Reporter => Some(&mut self.reporter),
            FilterKey::Component => Some(&mut self.component),
            FilterKey::CreatedAfter => Some(&mut self.created_after),
            FilterKey::UpdatedAfter => Some(&mut self.updated_after),
            FilterKey::Labels => None,
        }
    }

    /// Set a structured filter. Labels accumulate; any other key may be set once.
    pub fn set(&mut self, key: FilterKey, value: impl Into<String>) -> Result<(), QueryError> {
        let value = value.into();
        match self.slot(key) {
            None => {
                self.labels.push(value);
                Ok(())
            }
            Some(slot) if slot.is_some() => Err(QueryError::DuplicateFilter(key.to_string())),
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
        }
    }

    /// Set a filter only when no value is present yet, e.g. a configured default project
    pub fn set_default(&mut self, key: FilterKey, value: impl Into<String>) {
        if let Some(slot) = self.slot(key) {
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Result<Self, QueryError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Add a `customfield_<id>=value` filter
    pub fn add_custom(&mut self, spec: &str) -> Result<(), QueryError> {
        let (field, value) = spec
            .split_once('=')
            .ok_or_else(|| QueryError::InvalidCustomField(spec.to_string()))?;
        let field = field.trim();
        if !CUSTOM_FIELD_REGEX.is_match(field) || value.trim().is_empty() {
            return Err(QueryError::InvalidCustomField(spec.to_string()));
        }
        self.custom_fields
            .push((field.to_string(), value.trim().to_string()));
        Ok(())
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        match key {
            FilterKey::Project => self.project.as_deref(),
            FilterKey::Status => self.status.as_deref(),
            FilterKey::IssueType => self.issue_type.as_deref(),
            FilterKey::Priority => self.priority.as_deref(),
            FilterKey::Assignee => self.assignee.as_deref(),
            FilterKey::Reporter => self.reporter.as_deref(),
            FilterKey::Component => self.component.as_deref(),
            FilterKey::CreatedAfter => self.created_after.as_deref(),
            FilterKey::UpdatedAfter => self.updated_after.as_deref(),
            FilterKey::Labels => None,
        }
    }

    /// True when neither structured filters nor a raw clause are present
    pub fn is_empty(&self) -> bool {
        FilterKey::ALL.iter().all(|key| self.get(*key).is_none())
            && self.labels.is_empty()
            && self.custom_fields.is_empty()
            && raw_condition(self.raw.as_deref()).is_none()
    }
}

/// What to do with a filter set that selects nothing in particular
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EmptyPolicy {
    #[default]
    Reject,
    /// Use this clause instead
    Default(String),
    /// Caller acknowledged that every issue may match
    AllIssues,
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    empty_policy: EmptyPolicy,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(clause: impl Into<String>) -> Self {
        Self {
            empty_policy: EmptyPolicy::Default(clause.into()),
        }
    }

    pub fn all_issues() -> Self {
        Self {
            empty_policy: EmptyPolicy::AllIssues,
        }
    }

    pub fn build(&self, filters: &FilterSet) -> Result<String, QueryError> {
        let mut clauses = Vec::new();

        for key in FilterKey::ALL {
            if key == FilterKey::Labels {
                if let Some(clause) = labels_clause(&filters.labels)? {
                    clauses.push(clause);
                }
                continue;
            }
            let Some(value) = filters.get(key) else {
                continue;
            };
            let value = non_empty(key, value)?;
            if key.is_date() {
                validate_date(key, value)?;
                clauses.push(format!("{} >= {}", key.jql_field(), quote_value(value)));
            } else {
                clauses.push(format!("{} = {}", key.jql_field(), quote_value(value)));
            }
        }

        let mut custom: Vec<(String, &str)> = Vec::with_capacity(filters.custom_fields.len());
        for (field, value) in &filters.custom_fields {
            let id = CUSTOM_FIELD_REGEX
                .captures(field.trim())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| QueryError::InvalidCustomField(format!("{field}={value}")))?;
            custom.push((id, value.as_str()));
        }
        custom.sort();
        custom.dedup();
        clauses.extend(
            custom
                .into_iter()
                .map(|(id, value)| format!("cf[{}] = {}", id, quote_value(value))),
        );

        let (raw, raw_order) = split_raw(filters.raw.as_deref());
        if let Some(raw) = raw {
            clauses.push(format!("({raw})"));
        }

        let order_by = filters
            .order_by
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .or(raw_order);

        let mut query = if clauses.is_empty() {
            match &self.empty_policy {
                EmptyPolicy::Reject => return Err(QueryError::NoFilters),
                EmptyPolicy::Default(clause) => clause.trim().to_string(),
                EmptyPolicy::AllIssues => String::new(),
            }
        } else {
            clauses.join(" AND ")
        };

        if let Some(order_by) = order_by {
            if !query.is_empty() {
                query.push(' ');
            }
            query.push_str("ORDER BY ");
            query.push_str(order_by);
        }

        Ok(query)
    }
}

fn non_empty(key: FilterKey, value: &str) -> Result<&str, QueryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(QueryError::InvalidFilter {
            key: key.to_string(),
            reason: "value must not be empty".to_string(),
        })
    } else {
        Ok(trimmed)
    }
}

fn labels_clause(labels: &[String]) -> Result<Option<String>, QueryError> {
    let mut values = Vec::with_capacity(labels.len());
    for label in labels {
        values.push(non_empty(FilterKey::Labels, label)?);
    }
    if values.is_empty() {
        return Ok(None);
    }
    values.sort_unstable();
    values.dedup();
    let quoted: Vec<String> = values.into_iter().map(quote_value).collect();
    Ok(Some(format!("labels IN ({})", quoted.join(", "))))
}

fn validate_date(key: FilterKey, value: &str) -> Result<(), QueryError> {
    let valid = RELATIVE_DATE_REGEX.is_match(value)
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").is_ok()
        || is_function_call(value);
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidFilter {
            key: key.to_string(),
            reason: format!(
                "'{value}' is not a date. Use YYYY-MM-DD, \"YYYY-MM-DD HH:MM\" or a relative offset like -7d"
            ),
        })
    }
}

/// Raw clause text without any trailing ORDER BY, plus that ordering if present
fn split_raw(raw: Option<&str>) -> (Option<&str>, Option<&str>) {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return (None, None);
    };
    let literals = literal_spans(raw);
    let order_by = ORDER_BY_REGEX
        .find_iter(raw)
        .filter(|m| !literals.iter().any(|span| span.contains(&m.start())))
        .last();
    match order_by {
        Some(m) => {
            let condition = raw[..m.start()].trim();
            let order = raw[m.end()..].trim();
            (
                Some(condition).filter(|c| !c.is_empty()),
                Some(order).filter(|o| !o.is_empty()),
            )
        }
        None => (Some(raw), None),
    }
}

/// Byte ranges of `"..."` and `'...'` literals. Backslash escapes the next character;
/// an unterminated literal runs to the end.
fn literal_spans(raw: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open: Option<(char, usize)> = None;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        match open {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some((quote, start)) if c == quote => {
                spans.push(start..i + c.len_utf8());
                open = None;
            }
            Some(_) => {}
            None if c == '"' || c == '\'' => open = Some((c, i)),
            None => {}
        }
    }
    if let Some((_, start)) = open {
        spans.push(start..raw.len());
    }
    spans
}

fn raw_condition(raw: Option<&str>) -> Option<&str> {
    split_raw(raw).0
}

pub fn is_function_call(value: &str) -> bool {
    FUNCTION_CALL_REGEX.is_match(value.trim())
}

/// Escape backslashes and double quotes for use inside a JQL string literal
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Quote a literal, leaving whole-value function calls untouched
pub fn quote_value(value: &str) -> String {
    if is_function_call(value) {
        value.trim().to_string()
    } else {
        format!("\"{}\"", escape(value))
    }
}
