// ABOUTME: End-to-end tests from command-line filters to finished JQL
// ABOUTME: Checks injection safety, defaults and the empty-query policies

use clap::Parser;
use jira_cli::cli::{Cli, Commands, FilterArgs};
use jira_cli::commands::{DEFAULT_LIST_JQL, bulk_query, list_query};
use jira_cli::error::{CliError, QueryError};
use jira_cli::query::{FilterKey, FilterSet, QueryBuilder};

fn list_filters(args: &[&str]) -> (Option<String>, FilterArgs) {
    let mut argv = vec!["jira", "list"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).expect("Should parse").command {
        Commands::List { query, filters, .. } => (query, filters),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_full_filter_set_in_declared_order() {
    let (query, filters) = list_filters(&[
        "--updated-after",
        "-2w",
        "--label",
        "urgent",
        "--assignee",
        "me",
        "--project",
        "DATA",
        "--status",
        "todo",
        "--type",
        "Bug",
        "--custom-field",
        "customfield_10016=8",
        "--order-by",
        "priority DESC",
        "created >= startOfMonth()",
    ]);

    let jql = list_query(&filters, query.as_deref(), None).unwrap();

    assert_eq!(
        jql,
        "project = \"DATA\" AND status = \"To Do\" AND issuetype = \"Bug\" \
         AND assignee = currentUser() AND labels IN (\"urgent\") AND updated >= \"-2w\" \
         AND cf[10016] = \"8\" AND (created >= startOfMonth()) ORDER BY priority DESC"
    );
}

#[test]
fn test_hostile_values_stay_inside_literals() {
    let (query, filters) = list_filters(&["--project", "X\" OR project = \"Y", "--label", "a\\b"]);

    let jql = list_query(&filters, query.as_deref(), None).unwrap();

    assert_eq!(
        jql,
        "project = \"X\\\" OR project = \\\"Y\" AND labels IN (\"a\\\\b\")"
    );
}

#[test]
fn test_list_without_filters_shows_my_issues() {
    let (query, filters) = list_filters(&[]);
    assert_eq!(list_query(&filters, query.as_deref(), None).unwrap(), DEFAULT_LIST_JQL);

    let (query, filters) = list_filters(&["--all", "--order-by", "created DESC"]);
    assert_eq!(
        list_query(&filters, query.as_deref(), None).unwrap(),
        "ORDER BY created DESC"
    );
}

#[test]
fn test_explicit_project_beats_default() {
    let (query, filters) = list_filters(&["--project", "OPS"]);
    assert_eq!(
        list_query(&filters, query.as_deref(), Some("DATA")).unwrap(),
        "project = \"OPS\""
    );
}

#[test]
fn test_bulk_query_never_defaults_to_everything() {
    let err = bulk_query(&FilterArgs::default(), None, Some("DATA")).unwrap_err();
    assert_eq!(err, CliError::Query(QueryError::NoFilters));
    assert!(err.help_text().is_some());

    let only_order = FilterArgs {
        order_by: Some("key".to_string()),
        ..FilterArgs::default()
    };
    assert!(bulk_query(&only_order, None, None).is_err());
}

#[test]
fn test_invalid_dates_fail_before_any_request() {
    let (query, filters) = list_filters(&["--created-after", "last tuesday"]);
    let err = list_query(&filters, query.as_deref(), None).unwrap_err();
    assert!(matches!(
        err,
        CliError::Query(QueryError::InvalidFilter { ref key, .. }) if key == "created-after"
    ));
}

#[test]
fn test_builder_is_deterministic_across_insertion_orders() {
    let mut first = FilterSet::new();
    first.set(FilterKey::Labels, "b").unwrap();
    first.set(FilterKey::Priority, "High").unwrap();
    first.set(FilterKey::Labels, "a").unwrap();
    first.add_custom("customfield_2=x").unwrap();
    first.add_custom("customfield_1=y").unwrap();

    let mut second = FilterSet::new();
    second.add_custom("customfield_1=y").unwrap();
    second.set(FilterKey::Labels, "a").unwrap();
    second.add_custom("customfield_2=x").unwrap();
    second.set(FilterKey::Labels, "b").unwrap();
    second.set(FilterKey::Priority, "High").unwrap();

    let builder = QueryBuilder::new();
    assert_eq!(builder.build(&first).unwrap(), builder.build(&second).unwrap());
}
