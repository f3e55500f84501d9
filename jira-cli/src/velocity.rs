// ABOUTME: Sprint velocity report built from closed sprints on an agile board
// ABOUTME: Counts completed issues per sprint and sums their story points

use jira_sdk::{RetryConfig, Sprint, TrackerClient};
use log::{debug, warn};
use serde::Serialize;

use crate::constants::{STORY_POINTS_FIELD_NAME, limits};
use crate::error::Result;
use crate::fields::FieldResolver;
use crate::query::{FilterKey, FilterSet, QueryBuilder};
use crate::search::{SearchOptions, search_issues};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintVelocity {
    pub sprint: Sprint,
    pub completed_issues: usize,
    pub completed_points: f64,
}

/// Mean completed points across the reported sprints
pub fn average_points(report: &[SprintVelocity]) -> f64 {
    if report.is_empty() {
        return 0.0;
    }
    report.iter().map(|v| v.completed_points).sum::<f64>() / report.len() as f64
}

/// Query for issues completed in `sprint_id` and updated in the last `days` days
pub fn completed_issues_query(sprint_id: u64, days: u32) -> Result<String> {
    let mut filters = FilterSet::new()
        .with(FilterKey::Status, "Done")?
        .with(FilterKey::UpdatedAfter, format!("-{days}d"))?;
    filters.raw = Some(format!("sprint = {sprint_id}"));
    Ok(QueryBuilder::new().build(&filters)?)
}

/// Story points field id: the configured one, else whatever "Story Points" resolves to
async fn story_points_field(fields: &FieldResolver, configured: Option<&str>) -> Option<String> {
    if let Some(id) = configured {
        return Some(id.to_string());
    }
    match fields.resolve(STORY_POINTS_FIELD_NAME).await {
        Ok(descriptor) => Some(descriptor.id),
        Err(e) => {
            warn!("Story points will be reported as 0: {}", e);
            None
        }
    }
}

pub async fn velocity(
    client: &dyn TrackerClient,
    fields: &FieldResolver,
    board_id: u64,
    days: u32,
    configured_points_field: Option<&str>,
    retry: &RetryConfig,
) -> Result<Vec<SprintVelocity>> {
    let points_field = story_points_field(fields, configured_points_field).await;
    let sprints = client.sprints(board_id, Some("closed")).await?;
    debug!("Board {} has {} closed sprints", board_id, sprints.len());

    let mut report = Vec::with_capacity(sprints.len());
    for sprint in sprints {
        let mut options = SearchOptions::new(completed_issues_query(sprint.id, days)?)
            .with_limit(limits::DEFAULT_MAX_RESULTS);
        if let Some(field) = &points_field {
            options = options.with_field(field.clone());
        }

        let issues = search_issues(client, &options, retry).await?;
        let completed_points = points_field
            .as_deref()
            .map(|field| issues.iter().filter_map(|i| i.number_field(field)).sum())
            .unwrap_or(0.0);

        report.push(SprintVelocity {
            sprint,
            completed_issues: issues.len(),
            completed_points,
        });
    }

    Ok(report)
}
