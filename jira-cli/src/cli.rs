// ABOUTME: CLI argument definitions for the Jira CLI application
// ABOUTME: Defines the command-line interface structure using clap derive macros

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "jira")]
#[command(about = "A CLI for Jira with bulk operations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable verbose output for debugging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Structured issue filters shared by list and bulk commands
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct FilterArgs {
    /// Project key (defaults to JIRA_DEFAULT_PROJECT)
    #[arg(long, short)]
    pub project: Option<String>,

    /// Status name, e.g. "In Progress" or an alias like inprog
    #[arg(long, short)]
    pub status: Option<String>,

    /// Issue type, e.g. Bug
    #[arg(long = "type", short = 't')]
    pub issue_type: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    /// Assignee ("me" for yourself)
    #[arg(long, short)]
    pub assignee: Option<String>,

    /// Reporter ("me" for yourself)
    #[arg(long)]
    pub reporter: Option<String>,

    #[arg(long)]
    pub component: Option<String>,

    /// Label to match (repeatable)
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,

    /// Created on or after: YYYY-MM-DD or a relative offset like -7d
    #[arg(long, allow_hyphen_values = true)]
    pub created_after: Option<String>,

    /// Updated on or after: YYYY-MM-DD or a relative offset like -7d
    #[arg(long, allow_hyphen_values = true)]
    pub updated_after: Option<String>,

    /// Custom field match as customfield_<id>=<value> (repeatable)
    #[arg(long = "custom-field", value_name = "FIELD=VALUE")]
    pub custom_fields: Vec<String>,

    /// Extra JQL combined with the other filters
    #[arg(long)]
    pub jql: Option<String>,

    /// Ordering, e.g. "updated DESC"
    #[arg(long)]
    pub order_by: Option<String>,

    /// Match every issue when no filter is given
    #[arg(long)]
    pub all: bool,
}

/// Execution knobs shared by bulk commands
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct BulkArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Show what would change without changing anything
    #[arg(long, conflicts_with = "yes")]
    pub dry_run: bool,

    /// Issues per batch
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Batches in flight at once
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Refuse to run when the query matches more issues than this
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_results: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List issues (defaults to issues assigned to you)
    List {
        /// Raw JQL, combined with any filters
        query: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Maximum number of issues to fetch
        #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..))]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show details for a single issue
    View {
        /// Issue key (e.g., PROJ-123)
        key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new issue, optionally from a template
    Create {
        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Project key (defaults to JIRA_DEFAULT_PROJECT)
        #[arg(long, short)]
        project: Option<String>,

        /// Issue type (defaults to JIRA_DEFAULT_ISSUE_TYPE)
        #[arg(long = "type", short = 't')]
        issue_type: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Assignee account id ("me" for yourself)
        #[arg(long)]
        assignee: Option<String>,

        /// Comma-separated labels
        #[arg(long)]
        labels: Option<String>,

        /// Template name, e.g. bug
        #[arg(long)]
        template: Option<String>,

        /// Field override by name or id (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// Show the payload without creating the issue
        #[arg(long)]
        dry_run: bool,
    },
    /// Update fields on one issue
    Update {
        /// Issue key (e.g., PROJ-123)
        key: String,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Assignee account id ("me" for yourself)
        #[arg(long)]
        assignee: Option<String>,

        /// Comma-separated labels to add
        #[arg(long)]
        add_labels: Option<String>,

        /// Field by name or id (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
    /// Update fields on every matching issue
    BulkUpdate {
        /// Raw JQL, combined with any filters
        query: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        bulk: BulkArgs,

        /// New assignee account id ("me" for yourself)
        #[arg(long = "set-assignee")]
        set_assignee: Option<String>,

        /// New priority
        #[arg(long = "set-priority")]
        set_priority: Option<String>,

        /// Transition to this status before the field update
        #[arg(long = "set-status")]
        set_status: Option<String>,

        /// Comma-separated labels to add
        #[arg(long)]
        add_labels: Option<String>,

        /// Field by name or id (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
    /// Transition every matching issue
    BulkTransition {
        /// Transition name, e.g. Done
        transition: String,

        /// Resolution to set, e.g. Fixed
        #[arg(long)]
        resolution: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        bulk: BulkArgs,
    },
    /// Delete every matching issue
    BulkDelete {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        bulk: BulkArgs,
    },
    /// Comment on every matching issue
    BulkComment {
        /// Comment text
        body: String,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        bulk: BulkArgs,
    },
    /// Add a watcher to every matching issue
    BulkWatch {
        /// Watcher account id ("me" for yourself)
        #[arg(long, default_value = "me")]
        watcher: String,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        bulk: BulkArgs,
    },
    /// Transition one issue by name
    Transition {
        key: String,

        /// Transition name (case insensitive)
        transition: String,

        #[arg(long)]
        resolution: Option<String>,
    },
    /// List transitions available for an issue
    Transitions {
        key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a comment to an issue
    Comment {
        key: String,

        /// Comment text
        body: String,
    },
    /// Log time spent on an issue
    Log {
        key: String,

        /// Time spent, e.g. "3h 30m" or 1d
        #[arg(long)]
        time: String,

        #[arg(long)]
        comment: Option<String>,
    },
    /// Link two issues
    Link {
        /// Inward issue key
        key: String,

        /// Outward issue key
        target: String,

        #[arg(long, default_value = "Relates")]
        link_type: String,
    },
    /// Start or stop watching an issue
    Watch {
        key: String,

        #[arg(long)]
        unwatch: bool,
    },
    /// List fields known to the server
    Fields {
        /// Issue whose values to show
        #[arg(long, requires = "with_values")]
        issue: Option<String>,

        /// Show each field's value on --issue
        #[arg(long, requires = "issue")]
        with_values: bool,

        /// Only custom fields
        #[arg(long)]
        custom_only: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage sprints
    Sprint {
        #[command(subcommand)]
        command: SprintCommands,
    },
    /// Completed work per closed sprint on a board
    Velocity {
        /// Board id
        board: u64,

        /// Only count issues updated in the last N days
        #[arg(long, default_value = "14", value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available issue templates
    Templates,
    /// List configured aliases
    Aliases,
}

#[derive(Subcommand, Debug)]
pub enum SprintCommands {
    /// List sprints on a board
    List {
        #[arg(long)]
        board: u64,

        /// Sprint state: future, active or closed
        #[arg(long)]
        state: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a sprint on a board
    Create {
        #[arg(long)]
        board: u64,

        #[arg(long)]
        name: String,

        /// Start date as YYYY-MM-DD
        #[arg(long)]
        start_date: Option<String>,
    },
    /// Move issues into a sprint
    Add {
        sprint: u64,

        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// Subcommand names aliases may not shadow
pub fn builtin_commands() -> Vec<String> {
    use clap::CommandFactory;

    Cli::command()
        .get_subcommands()
        .flat_map(|cmd| {
            std::iter::once(cmd.get_name().to_string())
                .chain(cmd.get_all_aliases().map(str::to_string))
        })
        .chain(["help".to_string()])
        .collect()
}
