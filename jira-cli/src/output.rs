// ABOUTME: This module handles output formatting for the Jira CLI
// ABOUTME: Table formatting with color support plus JSON output for scripting

use anyhow::Result;
use jira_sdk::{FieldDescriptor, Issue, Sprint, Transition};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::bulk::{AbortReason, BulkReport, JobState, PlannedImpact};
use crate::constants::ui;
use crate::fields::FieldWithValue;
use crate::templates::TemplateSource;
use crate::types::StatusKind;
use crate::velocity::{SprintVelocity, average_points};

pub trait OutputFormat {
    fn format_issues(&self, issues: &[Issue]) -> Result<String>;
}

pub struct TableFormatter {
    use_color: bool,
}

impl TableFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn truncate(text: &str, max_len: usize) -> String {
        if text.chars().count() <= max_len {
            text.to_string()
        } else {
            let head: String = text.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    fn format_status(&self, status: Option<&str>) -> String {
        let Some(status) = status else {
            return "-".to_string();
        };
        if !self.use_color {
            return status.to_string();
        }
        match StatusKind::from(status) {
            StatusKind::ToDo => status.dimmed().to_string(),
            StatusKind::InProgress | StatusKind::InReview => status.yellow().to_string(),
            StatusKind::Done => status.green().to_string(),
            StatusKind::Blocked => status.red().to_string(),
            StatusKind::Other(_) => status.to_string(),
        }
    }

    fn format_assignee(&self, assignee: Option<&str>) -> String {
        let text = assignee.unwrap_or("Unassigned");

        if self.use_color && assignee.is_none() {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.use_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Full view of one issue
    pub fn format_issue_detail(&self, issue: &Issue) -> String {
        let mut lines = vec![
            self.heading(&format!("{}: {}", issue.key, issue.summary)),
            "─".repeat(ui::BORDER_LINE_LENGTH),
            format!("Status:   {}", self.format_status(issue.status.as_deref())),
            format!("Type:     {}", issue.issue_type.as_deref().unwrap_or("-")),
            format!("Priority: {}", issue.priority.as_deref().unwrap_or("-")),
            format!("Assignee: {}", self.format_assignee(issue.assignee.as_deref())),
        ];
        if !issue.labels.is_empty() {
            lines.push(format!("Labels:   {}", issue.labels.join(", ")));
        }
        if let Some(created) = &issue.created {
            lines.push(format!("Created:  {created}"));
        }
        if let Some(updated) = &issue.updated {
            lines.push(format!("Updated:  {updated}"));
        }
        if let Some(description) = &issue.description {
            lines.push(String::new());
            lines.push(description.clone());
        }
        lines.join("\n")
    }

    pub fn format_transitions(&self, transitions: &[Transition]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Transition")]
            name: String,
            #[tabled(rename = "To Status")]
            to_status: String,
        }

        render(transitions.iter().map(|t| Row {
            id: t.id.clone(),
            name: t.name.clone(),
            to_status: self.format_status(t.to_status.as_deref()),
        }))
    }

    pub fn format_fields(&self, fields: &[FieldDescriptor]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Type")]
            schema_type: String,
            #[tabled(rename = "Custom")]
            custom: String,
        }

        render(fields.iter().map(|f| Row {
            id: f.id.clone(),
            name: f.human_name.clone(),
            schema_type: f.schema_type.clone().unwrap_or_default(),
            custom: if f.is_custom { "yes" } else { "" }.to_string(),
        }))
    }

    pub fn format_field_values(&self, fields: &[FieldWithValue]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Type")]
            schema_type: String,
            #[tabled(rename = "Value")]
            value: String,
        }

        render(fields.iter().map(|row| Row {
            id: row.field.id.clone(),
            name: row.field.human_name.clone(),
            schema_type: row.field.schema_type.clone().unwrap_or_default(),
            value: row
                .value
                .as_deref()
                .map(|v| Self::truncate(v, ui::SUMMARY_WIDTH))
                .unwrap_or_default(),
        }))
    }

    pub fn format_sprints(&self, sprints: &[Sprint]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "ID")]
            id: u64,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "State")]
            state: String,
            #[tabled(rename = "Start")]
            start: String,
            #[tabled(rename = "End")]
            end: String,
        }

        render(sprints.iter().map(|s| Row {
            id: s.id,
            name: s.name.clone(),
            state: s.state.clone().unwrap_or_default(),
            start: s.start_date.clone().unwrap_or_default(),
            end: s.end_date.clone().unwrap_or_default(),
        }))
    }

    pub fn format_velocity(&self, report: &[SprintVelocity]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "Sprint")]
            sprint: String,
            #[tabled(rename = "Completed")]
            completed: usize,
            #[tabled(rename = "Points")]
            points: String,
        }

        let table = render(report.iter().map(|v| Row {
            sprint: v.sprint.name.clone(),
            completed: v.completed_issues,
            points: format!("{:.1}", v.completed_points),
        }));
        format!(
            "{}\n{} {:.1}",
            table,
            self.heading("Average points per sprint:"),
            average_points(report)
        )
    }

    pub fn format_templates(&self, templates: &[(String, TemplateSource)]) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "Template")]
            name: String,
            #[tabled(rename = "Source")]
            source: String,
        }

        render(templates.iter().map(|(name, source)| Row {
            name: name.clone(),
            source: source.to_string(),
        }))
    }

    pub fn format_aliases<'a>(&self, aliases: impl Iterator<Item = (&'a str, String)>) -> String {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "Alias")]
            name: String,
            #[tabled(rename = "Expands To")]
            expansion: String,
        }

        render(aliases.map(|(name, expansion)| Row {
            name: name.to_string(),
            expansion,
        }))
    }

    /// What a bulk job is about to do, shown before confirmation and for --dry-run
    pub fn format_planned_impact(&self, impact: &PlannedImpact) -> String {
        let operations: Vec<String> = impact.operations.iter().map(|op| op.to_string()).collect();
        let mut lines = vec![
            format!("Query:      {}", impact.query),
            format!("Operation:  {}", operations.join(", then ")),
            format!("Matches:    {} issue(s)", self.heading(&impact.count.to_string())),
        ];
        if !impact.sample.is_empty() {
            let more = impact.count.saturating_sub(impact.sample.len());
            let suffix = if more > 0 {
                format!(" (+{more} more)")
            } else {
                String::new()
            };
            lines.push(format!("Issues:     {}{}", impact.sample.join(", "), suffix));
        }
        lines.join("\n")
    }

    pub fn format_bulk_report(&self, report: &BulkReport) -> String {
        let result = &report.result;
        let outcome = match report.state {
            JobState::Aborted(AbortReason::Declined) => "Cancelled before any change".to_string(),
            JobState::Aborted(AbortReason::Cancelled) => "Interrupted".to_string(),
            _ => "Finished".to_string(),
        };
        let mut lines = vec![format!(
            "{}: {} succeeded, {} failed, {} not attempted",
            self.heading(&outcome),
            result.succeeded.len(),
            result.failed.len(),
            result.not_attempted.len()
        )];

        if !result.failed.is_empty() {
            #[derive(Tabled)]
            struct Row {
                #[tabled(rename = "Issue")]
                key: String,
                #[tabled(rename = "Error")]
                error: String,
            }

            lines.push(render(result.failed.iter().map(|(key, error)| Row {
                key: key.clone(),
                error: error.to_string(),
            })));
        }
        if !result.not_attempted.is_empty() && report.state != JobState::Aborted(AbortReason::Declined)
        {
            lines.push(format!("Not attempted: {}", result.not_attempted.join(", ")));
        }
        lines.join("\n")
    }
}

fn render<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    table.to_string()
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
}

impl OutputFormat for TableFormatter {
    fn format_issues(&self, issues: &[Issue]) -> Result<String> {
        Ok(render(issues.iter().map(|issue| IssueRow {
            key: issue.key.clone(),
            summary: Self::truncate(&issue.summary, ui::SUMMARY_WIDTH),
            status: self.format_status(issue.status.as_deref()),
            assignee: self.format_assignee(issue.assignee.as_deref()),
        })))
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn format<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }
}

impl OutputFormat for JsonFormatter {
    fn format_issues(&self, issues: &[Issue]) -> Result<String> {
        self.format(issues)
    }
}
