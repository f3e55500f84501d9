// ABOUTME: Command handlers connecting parsed arguments to the query and bulk engine
// ABOUTME: Builds filters, payloads and bulk jobs, then prints results through the formatters

use anyhow::Result;
use chrono::NaiveDate;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use jira_sdk::{IssueUpdate, JiraClient, RetryConfig, TrackerClient, retry_with_backoff};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::aliases::AliasResolver;
use crate::bulk::{
    AutoApprove, BulkJob, BulkOperation, BulkOperationExecutor, CancellationFlag,
    ConfirmationGate, PlannedImpact, ProgressCallback,
};
use crate::cli::{BulkArgs, Commands, FilterArgs, SprintCommands};
use crate::cli_output::CliOutput;
use crate::config::{Config, Credentials, ENV_DEFAULT_PROJECT};
use crate::constants::{canonical_status, timeouts};
use crate::error::{CliError, ConfigurationError, QueryError};
use crate::fields::FieldResolver;
use crate::output::{JsonFormatter, OutputFormat, TableFormatter};
use crate::query::{FilterKey, FilterSet, QueryBuilder};
use crate::search::{SearchOptions, search_issues};
use crate::templates::{FieldMapping, FieldValue, TemplateResolver, normalize, normalize_layers};
use crate::velocity::velocity;

/// Used by `list` when no criteria are given
pub const DEFAULT_LIST_JQL: &str = "assignee = currentUser()";

static TIME_SPENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[wdhm]$").expect("invalid time spent regex"));

/// How a command finished when it did not return an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A bulk run finished but some issues failed
    PartialFailure,
}

/// Authenticated tracker access
pub struct Remote {
    pub client: Arc<dyn TrackerClient>,
    pub fields: FieldResolver,
    /// Applied to every single-issue request
    pub retry: RetryConfig,
}

impl Remote {
    pub fn new(client: Arc<dyn TrackerClient>, retry: RetryConfig) -> Self {
        let fields = FieldResolver::new(client.clone()).with_retry(retry.clone());
        Self {
            client,
            fields,
            retry,
        }
    }

    pub fn connect(credentials: Credentials, retry: RetryConfig) -> crate::error::Result<Self> {
        let client = JiraClient::builder()
            .base_url(credentials.server)
            .email(credentials.email)
            .api_token(credentials.api_token)
            .build()?;
        Ok(Self::new(Arc::new(client), retry))
    }
}

pub struct CommandContext {
    pub config: Config,
    pub aliases: AliasResolver,
    /// Commands that never touch the server run even when credentials are missing
    pub remote: std::result::Result<Remote, CliError>,
    pub retry: RetryConfig,
    pub output: CliOutput,
    pub formatter: TableFormatter,
    pub cancel: CancellationFlag,
}

impl CommandContext {
    fn remote(&self) -> crate::error::Result<&Remote> {
        self.remote.as_ref().map_err(Clone::clone)
    }

    fn default_project(&self) -> Option<&str> {
        self.config.default_project.as_deref()
    }
}

/// Translate "me" into the query language's current-user function
fn user_filter(value: &str) -> String {
    if value.eq_ignore_ascii_case("me") {
        "currentUser()".to_string()
    } else {
        value.to_string()
    }
}

/// Structured filters from the command line. `positional` is raw JQL given as an argument.
pub fn filters_from_args(
    args: &FilterArgs,
    positional: Option<&str>,
) -> crate::error::Result<FilterSet> {
    let mut filters = FilterSet::new();
    let singles = [
        (FilterKey::Project, args.project.clone()),
        (FilterKey::Status, args.status.as_deref().map(canonical_status)),
        (FilterKey::IssueType, args.issue_type.clone()),
        (FilterKey::Priority, args.priority.clone()),
        (FilterKey::Assignee, args.assignee.as_deref().map(user_filter)),
        (FilterKey::Reporter, args.reporter.as_deref().map(user_filter)),
        (FilterKey::Component, args.component.clone()),
        (FilterKey::CreatedAfter, args.created_after.clone()),
        (FilterKey::UpdatedAfter, args.updated_after.clone()),
    ];
    for (key, value) in singles {
        if let Some(value) = value {
            filters.set(key, value)?;
        }
    }
    for label in &args.labels {
        filters.set(FilterKey::Labels, label.clone())?;
    }
    for custom in &args.custom_fields {
        filters.add_custom(custom)?;
    }

    filters.raw = match (positional, args.jql.as_deref()) {
        (Some(_), Some(_)) => return Err(QueryError::DuplicateFilter("jql".to_string()).into()),
        (raw, flag) => raw.or(flag).map(str::to_string),
    };
    filters.order_by = args.order_by.clone();
    Ok(filters)
}

/// Query for `list`: falls back to the current user's issues when nothing selects
pub fn list_query(
    args: &FilterArgs,
    positional: Option<&str>,
    default_project: Option<&str>,
) -> crate::error::Result<String> {
    let mut filters = filters_from_args(args, positional)?;
    if let Some(project) = default_project {
        filters.set_default(FilterKey::Project, project);
    }
    let builder = if args.all {
        QueryBuilder::all_issues()
    } else {
        QueryBuilder::with_default(DEFAULT_LIST_JQL)
    };
    Ok(builder.build(&filters)?)
}

/// Query for bulk commands. The default project never makes an empty selection valid.
pub fn bulk_query(
    args: &FilterArgs,
    positional: Option<&str>,
    default_project: Option<&str>,
) -> crate::error::Result<String> {
    let mut filters = filters_from_args(args, positional)?;
    if filters.is_empty() && !args.all {
        return Err(QueryError::NoFilters.into());
    }
    if let Some(project) = default_project {
        filters.set_default(FilterKey::Project, project);
    }
    let builder = if args.all {
        QueryBuilder::all_issues()
    } else {
        QueryBuilder::new()
    };
    Ok(builder.build(&filters)?)
}

/// Parse repeated `NAME=VALUE` arguments
pub fn parse_assignments(pairs: &[String]) -> std::result::Result<FieldMapping, ConfigurationError> {
    let mut mapping = FieldMapping::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| ConfigurationError::InvalidValue {
                key: "--field".to_string(),
                reason: format!("'{pair}' is not NAME=VALUE"),
            })?;
        mapping.insert(name.trim().to_string(), FieldValue::from(value.trim()));
    }
    Ok(mapping)
}

pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a worklog duration such as "3h 30m"; returns it with normalized spacing
pub fn validate_time_spent(value: &str) -> std::result::Result<String, ConfigurationError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.is_empty() || !parts.iter().all(|p| TIME_SPENT_REGEX.is_match(p)) {
        return Err(ConfigurationError::InvalidValue {
            key: "--time".to_string(),
            reason: format!("'{value}' is not a duration. Use units w, d, h, m, e.g. \"3h 30m\""),
        });
    }
    Ok(parts.join(" "))
}

fn validate_date(key: &str, value: &str) -> std::result::Result<(), ConfigurationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ConfigurationError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{value}' is not a YYYY-MM-DD date"),
        })
}

/// Account id for a user argument, with "me" meaning the authenticated user
async fn resolve_account(remote: &Remote, value: &str) -> crate::error::Result<String> {
    if value.eq_ignore_ascii_case("me") {
        let user = retry_with_backoff(&remote.retry, || remote.client.myself()).await?;
        Ok(user.account_id)
    } else {
        Ok(value.to_string())
    }
}

/// Common single-issue and bulk field edits
struct FieldEdits<'a> {
    summary: Option<&'a str>,
    description: Option<&'a str>,
    priority: Option<&'a str>,
    assignee: Option<&'a str>,
    add_labels: Option<&'a str>,
    fields: &'a [String],
}

async fn build_update(remote: &Remote, edits: FieldEdits<'_>) -> crate::error::Result<IssueUpdate> {
    let mut mapping = parse_assignments(edits.fields)?;
    if let Some(summary) = edits.summary {
        mapping.insert("summary".to_string(), summary.into());
    }
    if let Some(description) = edits.description {
        mapping.insert("description".to_string(), description.into());
    }
    if let Some(priority) = edits.priority {
        mapping.insert("priority".to_string(), priority.into());
    }
    if let Some(assignee) = edits.assignee {
        let account = resolve_account(remote, assignee).await?;
        mapping.insert("assignee".to_string(), account.into());
    }

    Ok(IssueUpdate {
        fields: normalize(&mapping, &remote.fields).await?,
        add_labels: edits.add_labels.map(split_csv).unwrap_or_default(),
    })
}

fn bulk_job(
    ctx: &CommandContext,
    query: String,
    operations: Vec<BulkOperation>,
    args: &BulkArgs,
) -> crate::error::Result<BulkJob> {
    let mut operations = operations.into_iter();
    let first = operations.next().ok_or_else(|| ConfigurationError::InvalidValue {
        key: "operation".to_string(),
        reason: "nothing to change. Pass at least one field, label or status".to_string(),
    })?;
    let settings = ctx.config.bulk_settings();
    let mut job = operations
        .fold(BulkJob::new(query, first), BulkJob::then)
        .with_batch_size(args.batch_size.map_or(settings.batch_size, |n| n as usize))
        .with_concurrency(args.concurrency.map_or(settings.concurrency, |n| n as usize))
        .with_max_results(args.max_results.map_or(settings.max_results, |n| n as usize));
    if args.yes {
        job = job.skip_confirmation();
    }
    Ok(job)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::no_length();
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} issues {msg}")
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(timeouts::PROGRESS_BAR_TICK_MS));
    pb
}

/// Prompt on the terminal; a closed or non-interactive stdin counts as "no"
fn prompt_confirmation(formatter: &TableFormatter, impact: &PlannedImpact) -> bool {
    eprintln!("{}", formatter.format_planned_impact(impact));
    Confirm::new()
        .with_prompt(format!("Apply to {} issue(s)?", impact.count))
        .default(false)
        .interact()
        .unwrap_or(false)
}

async fn run_bulk(
    ctx: &CommandContext,
    filters: &FilterArgs,
    positional: Option<&str>,
    args: &BulkArgs,
    operations: Vec<BulkOperation>,
) -> crate::error::Result<Outcome> {
    let remote = ctx.remote()?;
    let query = bulk_query(filters, positional, ctx.default_project())?;
    let job = bulk_job(ctx, query, operations, args)?;
    let executor = BulkOperationExecutor::new(remote.client.clone()).with_retry(ctx.retry.clone());

    if args.dry_run {
        let impact = executor.plan(&job).await?;
        ctx.output.dry_run("no issues were changed");
        println!("{}", ctx.formatter.format_planned_impact(&impact));
        return Ok(Outcome::Success);
    }

    let pb = progress_bar();
    let ticker = pb.clone();
    let progress: ProgressCallback = Arc::new(move |done| ticker.inc(done as u64));
    let executor = executor.with_progress(progress);

    let bar = pb.clone();
    let formatter = &ctx.formatter;
    let prompt = move |impact: &PlannedImpact| {
        let confirmed = bar.suspend(|| prompt_confirmation(formatter, impact));
        bar.set_length(impact.count as u64);
        confirmed
    };
    let gate: &dyn ConfirmationGate = if job.requires_confirmation {
        &prompt
    } else {
        &AutoApprove
    };

    let report = executor.execute(&job, gate, &ctx.cancel).await;
    pb.finish_and_clear();
    let report = report?;

    println!("{}", ctx.formatter.format_bulk_report(&report));
    if report.result.has_failures() {
        Ok(Outcome::PartialFailure)
    } else {
        Ok(Outcome::Success)
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", JsonFormatter::new(true).format(value)?);
    Ok(())
}

pub async fn run(ctx: &CommandContext, command: Commands) -> Result<Outcome> {
    match command {
        Commands::List {
            query,
            filters,
            limit,
            json,
        } => {
            let remote = ctx.remote()?;
            let jql = list_query(&filters, query.as_deref(), ctx.default_project())?;
            log::debug!("list query: {}", jql);
            let options = SearchOptions::new(jql).with_limit(limit as usize);
            let issues = search_issues(remote.client.as_ref(), &options, &ctx.retry).await?;

            if json {
                println!("{}", JsonFormatter::new(true).format_issues(&issues)?);
            } else if issues.is_empty() {
                println!("No issues found.");
            } else {
                println!("{}", ctx.formatter.format_issues(&issues)?);
            }
        }
        Commands::View { key, json } => {
            let remote = ctx.remote()?;
            let issue = retry_with_backoff(&remote.retry, || remote.client.get_issue(&key)).await?;
            if json {
                print_json(&issue)?;
            } else {
                println!("{}", ctx.formatter.format_issue_detail(&issue));
            }
        }
        Commands::Create {
            summary,
            description,
            project,
            issue_type,
            priority,
            assignee,
            labels,
            template,
            fields,
            dry_run,
        } => {
            let remote = ctx.remote()?;
            let mut overrides = parse_assignments(&fields)?;
            let named = [
                ("summary", summary),
                ("description", description),
                ("project", project),
                ("issuetype", issue_type),
                ("priority", priority),
                ("labels", labels),
            ];
            for (name, value) in named {
                if let Some(value) = value {
                    overrides.insert(name.to_string(), value.into());
                }
            }
            if let Some(assignee) = assignee {
                let account = resolve_account(remote, &assignee).await?;
                overrides.insert("assignee".to_string(), account.into());
            }

            let template_fields = match &template {
                Some(name) => TemplateResolver::new(ctx.config.template_dirs()).load(name)?.fields,
                None => FieldMapping::new(),
            };
            let mut defaults = FieldMapping::new();
            if let Some(project) = ctx.default_project() {
                defaults.insert("project".to_string(), project.into());
            }
            let issue_type = ctx.config.default_issue_type.as_deref().unwrap_or("Task");
            defaults.insert("issuetype".to_string(), issue_type.into());

            let payload =
                normalize_layers(&[&defaults, &template_fields, &overrides], &remote.fields).await?;
            if !payload.contains_key("project") {
                return Err(CliError::from(ConfigurationError::MissingSetting(format!(
                    "project (--project or {ENV_DEFAULT_PROJECT})"
                )))
                .into());
            }
            if !payload.contains_key("summary") {
                return Err(CliError::from(ConfigurationError::MissingSetting("summary".to_string())).into());
            }

            if dry_run {
                ctx.output.dry_run("issue not created");
                print_json(&payload)?;
            } else {
                let strict = remote.retry.non_idempotent();
                let key = retry_with_backoff(&strict, || remote.client.create_issue(&payload)).await?;
                ctx.output.success(&format!("Created {key}"));
                println!("{key}");
            }
        }
        Commands::Update {
            key,
            summary,
            description,
            priority,
            assignee,
            add_labels,
            fields,
        } => {
            let remote = ctx.remote()?;
            let update = build_update(
                remote,
                FieldEdits {
                    summary: summary.as_deref(),
                    description: description.as_deref(),
                    priority: priority.as_deref(),
                    assignee: assignee.as_deref(),
                    add_labels: add_labels.as_deref(),
                    fields: &fields,
                },
            )
            .await?;
            if update.is_empty() {
                return Err(CliError::from(ConfigurationError::InvalidValue {
                    key: "update".to_string(),
                    reason: "nothing to change".to_string(),
                })
                .into());
            }
            retry_with_backoff(&remote.retry, || remote.client.update_fields(&key, &update)).await?;
            ctx.output.success(&format!("Updated {key}"));
        }
        Commands::BulkUpdate {
            query,
            filters,
            bulk,
            set_assignee,
            set_priority,
            set_status,
            add_labels,
            fields,
        } => {
            let remote = ctx.remote()?;
            let update = build_update(
                remote,
                FieldEdits {
                    summary: None,
                    description: None,
                    priority: set_priority.as_deref(),
                    assignee: set_assignee.as_deref(),
                    add_labels: add_labels.as_deref(),
                    fields: &fields,
                },
            )
            .await?;

            let mut operations = Vec::new();
            if let Some(status) = set_status {
                operations.push(BulkOperation::Transition {
                    name: canonical_status(&status),
                    resolution: None,
                });
            }
            if !update.is_empty() {
                operations.push(BulkOperation::UpdateFields(update));
            }
            return Ok(run_bulk(ctx, &filters, query.as_deref(), &bulk, operations).await?);
        }
        Commands::BulkTransition {
            transition,
            resolution,
            filters,
            bulk,
        } => {
            let operation = BulkOperation::Transition {
                name: transition,
                resolution,
            };
            return Ok(run_bulk(ctx, &filters, None, &bulk, vec![operation]).await?);
        }
        Commands::BulkDelete { filters, bulk } => {
            return Ok(run_bulk(ctx, &filters, None, &bulk, vec![BulkOperation::Delete]).await?);
        }
        Commands::BulkComment {
            body,
            filters,
            bulk,
        } => {
            let operation = BulkOperation::AddComment(body);
            return Ok(run_bulk(ctx, &filters, None, &bulk, vec![operation]).await?);
        }
        Commands::BulkWatch {
            watcher,
            filters,
            bulk,
        } => {
            let account = resolve_account(ctx.remote()?, &watcher).await?;
            let operation = BulkOperation::AddWatcher(account);
            return Ok(run_bulk(ctx, &filters, None, &bulk, vec![operation]).await?);
        }
        Commands::Transition {
            key,
            transition,
            resolution,
        } => {
            let remote = ctx.remote()?;
            let strict = remote.retry.non_idempotent();
            retry_with_backoff(&strict, || {
                remote.client.transition(&key, &transition, resolution.as_deref())
            })
            .await?;
            ctx.output.success(&format!("Transitioned {key} via '{transition}'"));
        }
        Commands::Transitions { key, json } => {
            let remote = ctx.remote()?;
            let transitions =
                retry_with_backoff(&remote.retry, || remote.client.transitions(&key)).await?;
            if json {
                print_json(&transitions)?;
            } else {
                println!("{}", ctx.formatter.format_transitions(&transitions));
            }
        }
        Commands::Comment { key, body } => {
            let remote = ctx.remote()?;
            let strict = remote.retry.non_idempotent();
            retry_with_backoff(&strict, || remote.client.add_comment(&key, &body)).await?;
            ctx.output.success(&format!("Commented on {key}"));
        }
        Commands::Log { key, time, comment } => {
            let time_spent = validate_time_spent(&time)?;
            let remote = ctx.remote()?;
            let strict = remote.retry.non_idempotent();
            retry_with_backoff(&strict, || {
                remote.client.log_work(&key, &time_spent, comment.as_deref())
            })
            .await?;
            ctx.output.success(&format!("Logged {time_spent} on {key}"));
        }
        Commands::Link {
            key,
            target,
            link_type,
        } => {
            let remote = ctx.remote()?;
            let strict = remote.retry.non_idempotent();
            retry_with_backoff(&strict, || remote.client.create_link(&key, &target, &link_type))
                .await?;
            ctx.output.success(&format!("Linked {key} {link_type} {target}"));
        }
        Commands::Watch { key, unwatch } => {
            let remote = ctx.remote()?;
            let account = resolve_account(remote, "me").await?;
            if unwatch {
                retry_with_backoff(&remote.retry, || remote.client.remove_watcher(&key, &account))
                    .await?;
                ctx.output.success(&format!("Stopped watching {key}"));
            } else {
                retry_with_backoff(&remote.retry, || remote.client.add_watcher(&key, &account))
                    .await?;
                ctx.output.success(&format!("Watching {key}"));
            }
        }
        Commands::Fields {
            issue,
            with_values,
            custom_only,
            json,
        } => {
            let remote = ctx.remote()?;
            match issue.filter(|_| with_values) {
                Some(key) => {
                    let issue =
                        retry_with_backoff(&remote.retry, || remote.client.get_issue(&key)).await?;
                    let rows = remote.fields.values_for(&issue, custom_only).await?;
                    if json {
                        print_json(&rows)?;
                    } else {
                        println!("{}", ctx.formatter.format_field_values(&rows));
                    }
                }
                None => {
                    let fields = remote.fields.descriptors(custom_only).await?;
                    if json {
                        print_json(&fields)?;
                    } else {
                        println!("{}", ctx.formatter.format_fields(&fields));
                    }
                }
            }
        }
        Commands::Sprint { command } => {
            let remote = ctx.remote()?;
            let client = remote.client.as_ref();
            match command {
                SprintCommands::List { board, state, json } => {
                    let sprints =
                        retry_with_backoff(&remote.retry, || client.sprints(board, state.as_deref()))
                            .await?;
                    if json {
                        print_json(&sprints)?;
                    } else {
                        println!("{}", ctx.formatter.format_sprints(&sprints));
                    }
                }
                SprintCommands::Create {
                    board,
                    name,
                    start_date,
                } => {
                    if let Some(date) = &start_date {
                        validate_date("--start-date", date)?;
                    }
                    let strict = remote.retry.non_idempotent();
                    let sprint = retry_with_backoff(&strict, || {
                        client.create_sprint(board, &name, start_date.as_deref())
                    })
                    .await?;
                    ctx.output
                        .success(&format!("Created sprint '{}' ({})", sprint.name, sprint.id));
                }
                SprintCommands::Add { sprint, keys } => {
                    retry_with_backoff(&remote.retry, || client.add_to_sprint(sprint, &keys)).await?;
                    ctx.output
                        .success(&format!("Added {} issue(s) to sprint {}", keys.len(), sprint));
                }
            }
        }
        Commands::Velocity { board, days, json } => {
            let remote = ctx.remote()?;
            let report = velocity(
                remote.client.as_ref(),
                &remote.fields,
                board,
                days,
                ctx.config.story_points_field.as_deref(),
                &ctx.retry,
            )
            .await?;
            if json {
                print_json(&report)?;
            } else if report.is_empty() {
                println!("No closed sprints on board {board}.");
            } else {
                println!("{}", ctx.formatter.format_velocity(&report));
            }
        }
        Commands::Templates => {
            let templates = TemplateResolver::new(ctx.config.template_dirs()).list();
            println!("{}", ctx.formatter.format_templates(&templates));
        }
        Commands::Aliases => {
            let aliases = ctx
                .aliases
                .definitions()
                .map(|(name, expansion)| (name, expansion.to_string()));
            println!("{}", ctx.formatter.format_aliases(aliases));
        }
    }

    Ok(Outcome::Success)
}
