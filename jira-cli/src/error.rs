// ABOUTME: Error taxonomy for the query and bulk-operation engine
// ABOUTME: Configuration, query, field-resolution and remote failures surfaced to commands

use jira_sdk::JiraError;
use thiserror::Error;

/// Bad alias, template or config file content
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Template '{name}' not found (searched: {searched})")]
    TemplateNotFound { name: String, searched: String },

    #[error("Template '{name}' is malformed: {reason}")]
    TemplateParse { name: String, reason: String },

    #[error("Alias cycle detected: {}", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("Unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("Alias '{alias}' requires argument ${index}")]
    MissingAliasArgument { alias: String, index: usize },

    #[error("Alias '{alias}' is invalid: {reason}")]
    InvalidAlias { alias: String, reason: String },

    #[error("Missing required setting '{0}'")]
    MissingSetting(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Malformed filters or a query with no criteria
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("No filters given. Pass at least one filter, a JQL clause, or --all")]
    NoFilters,

    #[error("Filter '{0}' was given more than once")]
    DuplicateFilter(String),

    #[error("Invalid value for filter '{key}': {reason}")]
    InvalidFilter { key: String, reason: String },

    #[error("Invalid custom field filter '{0}'. Expected customfield_<id>=value")]
    InvalidCustomField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldResolutionError {
    #[error("Unknown field '{0}'. Run `jira fields` to list available fields")]
    UnknownField(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CliError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    FieldResolution(#[from] FieldResolutionError),

    #[error(transparent)]
    Remote(#[from] JiraError),

    #[error("Search matched more than {cap} issues. Narrow the query or raise --max-results")]
    ResultSetTooLarge { cap: usize },
}

impl CliError {
    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            CliError::Remote(err) => err.help_text(),
            CliError::Configuration(ConfigurationError::TemplateNotFound { .. }) => {
                Some("Run `jira templates` to list the available templates")
            }
            CliError::Configuration(ConfigurationError::AliasCycle { .. })
            | CliError::Configuration(ConfigurationError::UnknownAlias(_)) => {
                Some("Run `jira aliases` to inspect configured aliases")
            }
            CliError::Query(QueryError::NoFilters) => {
                Some("Use --project, --status, --assignee or a JQL clause to select issues")
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_cycle_message_shows_chain() {
        let err = ConfigurationError::AliasCycle {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Alias cycle detected: a -> b -> a");
    }

    #[test]
    fn test_remote_errors_keep_sdk_help() {
        let err = CliError::from(JiraError::Auth("bad token".to_string()));
        assert!(err.help_text().unwrap().contains("JIRA_API_TOKEN"));
        assert_eq!(err.to_string(), "Authentication failed: bad token");
    }

    #[test]
    fn test_query_error_converts() {
        let err: CliError = QueryError::DuplicateFilter("status".to_string()).into();
        assert!(matches!(err, CliError::Query(QueryError::DuplicateFilter(_))));
    }
}
