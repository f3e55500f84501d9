// ABOUTME: Benchmark for JQL construction and alias expansion on the command hot path
// ABOUTME: Covers filter-to-JQL builds, value escaping, config parsing and nested alias rendering

use criterion::{Criterion, criterion_group, criterion_main};
use jira_cli::aliases::AliasResolver;
use jira_cli::cli::builtin_commands;
use jira_cli::config::Config;
use jira_cli::query::{FilterKey, FilterSet, QueryBuilder, escape};

const SAMPLE_CONFIG_TOML: &str = r#"
server = "https://example.atlassian.net"
email = "dev@example.com"
default_project = "DATA"

[aliases]
mine = "my --status $1"
mine-open = ["mine", "in-progress"]
triage = "list --status todo --project DATA --order-by 'priority DESC'"
close = ["bulk-transition", "Done", "--jql", "$1", "--yes"]

[bulk]
batch_size = 25
concurrency = 4
"#;

fn sample_filters() -> FilterSet {
    let mut filters = FilterSet::new();
    filters.set(FilterKey::Project, "DATA").expect("valid project");
    filters.set(FilterKey::Status, "in-progress").expect("valid status");
    filters.set(FilterKey::Assignee, "me").expect("valid assignee");
    filters.set(FilterKey::Labels, "backend").expect("valid label");
    filters.set(FilterKey::Labels, "urgent").expect("valid label");
    filters.set(FilterKey::UpdatedAfter, "-2w").expect("valid date");
    filters
        .add_custom("customfield_10016=8")
        .expect("valid custom field");
    filters
}

fn benchmark_query_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_building");
    let builder = QueryBuilder::new();
    let filters = sample_filters();

    group.bench_function("build_structured_filters", |b| {
        b.iter(|| builder.build(&filters).expect("Should build JQL"));
    });

    let mut with_raw = sample_filters();
    with_raw.raw = Some("created >= startOfMonth() OR priority = Highest".to_string());
    with_raw.order_by = Some("priority DESC, updated DESC".to_string());

    group.bench_function("build_with_raw_clause", |b| {
        b.iter(|| builder.build(&with_raw).expect("Should build JQL"));
    });

    let hostile = "X\" OR project = \"Y\\".repeat(32);
    group.bench_function("escape_hostile_value", |b| {
        b.iter(|| escape(&hostile));
    });

    group.finish();
}

fn benchmark_alias_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_expansion");
    let config: Config = toml::from_str(SAMPLE_CONFIG_TOML).expect("Should parse config");
    let builtins = builtin_commands();
    let names: Vec<&str> = builtins.iter().map(String::as_str).collect();

    group.bench_function("load_and_validate_aliases", |b| {
        b.iter(|| {
            AliasResolver::new(&config.aliases_with_defaults(), &names)
                .expect("Should validate aliases")
        });
    });

    let resolver =
        AliasResolver::new(&config.aliases_with_defaults(), &names).expect("valid aliases");
    let argv: Vec<String> = ["jira", "mine-open", "--limit", "20"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    group.bench_function("expand_nested_alias", |b| {
        b.iter(|| {
            resolver
                .expand_argv(argv.clone())
                .expect("Should expand alias")
        });
    });

    group.bench_function("parse_config", |b| {
        b.iter(|| {
            let config: Config = toml::from_str(SAMPLE_CONFIG_TOML).expect("Should parse config");
            config
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_query_building, benchmark_alias_expansion);
criterion_main!(benches);
