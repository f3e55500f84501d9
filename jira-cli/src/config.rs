// ABOUTME: Configuration file loading, validation, and hierarchical merging for Jira CLI
// ABOUTME: Supports TOML config files, XDG locations, and JIRA_* environment overrides

use anyhow::{Context, Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aliases::AliasExpansion;
use crate::constants::{DEFAULT_ALIASES, limits};
use crate::error::ConfigurationError;

pub const ENV_SERVER: &str = "JIRA_SERVER";
pub const ENV_EMAIL: &str = "JIRA_EMAIL";
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const ENV_DEFAULT_PROJECT: &str = "JIRA_DEFAULT_PROJECT";
pub const ENV_DEFAULT_ISSUE_TYPE: &str = "JIRA_DEFAULT_ISSUE_TYPE";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_token: Option<SecretString>,
    #[serde(default)]
    pub default_project: Option<String>,
    #[serde(default)]
    pub default_issue_type: Option<String>,
    /// Field id holding story points, e.g. customfield_10016
    #[serde(default)]
    pub story_points_field: Option<String>,
    #[serde(default)]
    pub aliases: Option<ConfigAliases>,
    #[serde(default)]
    pub templates: Option<ConfigTemplates>,
    #[serde(default)]
    pub bulk: Option<ConfigBulk>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigAliases {
    #[serde(flatten)]
    pub commands: BTreeMap<String, AliasExpansion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigTemplates {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ConfigBulk {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Bulk execution settings after defaults are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_results: usize,
}

/// Everything needed to authenticate against the server
#[derive(Debug)]
pub struct Credentials {
    pub server: String,
    pub email: String,
    pub api_token: SecretString,
}

impl Config {
    /// Load configuration from standard locations, then apply environment overrides
    pub fn load() -> Result<Self> {
        let paths = Self::get_config_paths();
        let mut config =
            Self::load_from_paths(&paths.iter().map(|p| p.as_str()).collect::<Vec<_>>())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file paths, later paths overriding earlier ones
    pub fn load_from_paths(paths: &[&str]) -> Result<Self> {
        let mut config = Config::default();

        for path in paths {
            if !Path::new(path).is_file() {
                continue;
            }
            log::debug!("Loading config from {}", path);
            config = config.merge(Self::load_from_file(path)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Standard config file paths, lowest precedence first
    pub fn get_config_paths() -> Vec<String> {
        let mut paths = Vec::new();

        // 1. User config directory
        if let Some(home_dir) = dirs::home_dir() {
            let path = home_dir.join(".config").join("jira-cli").join("config.toml");
            paths.push(path.to_string_lossy().to_string());
        }

        // 2. XDG config home
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            let path = PathBuf::from(config_home)
                .join("jira-cli")
                .join("config.toml");
            let path = path.to_string_lossy().to_string();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        // 3. Project-specific config (highest precedence)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(
                current_dir
                    .join("jira-cli.toml")
                    .to_string_lossy()
                    .to_string(),
            );
        }

        paths
    }

    /// Merge this config with another, giving precedence to the other config
    pub fn merge(self, other: Config) -> Config {
        Config {
            server: other.server.or(self.server),
            email: other.email.or(self.email),
            api_token: other.api_token.or(self.api_token),
            default_project: other.default_project.or(self.default_project),
            default_issue_type: other.default_issue_type.or(self.default_issue_type),
            story_points_field: other.story_points_field.or(self.story_points_field),
            aliases: match (self.aliases, other.aliases) {
                (Some(base), Some(other)) => Some(base.merge(other)),
                (base, other) => other.or(base),
            },
            templates: match (self.templates, other.templates) {
                (Some(mut base), Some(other)) => {
                    base.paths.extend(other.paths);
                    Some(base)
                }
                (base, other) => other.or(base),
            },
            bulk: match (self.bulk, other.bulk) {
                (Some(base), Some(other)) => Some(ConfigBulk {
                    batch_size: other.batch_size.or(base.batch_size),
                    concurrency: other.concurrency.or(base.concurrency),
                    max_results: other.max_results.or(base.max_results),
                }),
                (base, other) => other.or(base),
            },
        }
    }

    /// Apply JIRA_* variables on top of file values. `lookup` abstracts the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(server) = get(ENV_SERVER) {
            self.server = Some(server);
        }
        if let Some(email) = get(ENV_EMAIL) {
            self.email = Some(email);
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            self.api_token = Some(SecretString::new(token.into_boxed_str()));
        }
        if let Some(project) = get(ENV_DEFAULT_PROJECT) {
            self.default_project = Some(project);
        }
        if let Some(issue_type) = get(ENV_DEFAULT_ISSUE_TYPE) {
            self.default_issue_type = Some(issue_type);
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(server) = &self.server {
            if !(server.starts_with("https://") || server.starts_with("http://")) {
                return Err(anyhow!(
                    "Invalid server '{}'. Expected a URL like https://your-domain.atlassian.net",
                    server
                ));
            }
        }

        if let Some(bulk) = &self.bulk {
            for (key, value) in [
                ("bulk.batch_size", bulk.batch_size),
                ("bulk.concurrency", bulk.concurrency),
                ("bulk.max_results", bulk.max_results),
            ] {
                if value == Some(0) {
                    return Err(anyhow!("Invalid {}: must be greater than zero", key));
                }
            }
        }

        Ok(())
    }

    pub fn credentials(&self) -> std::result::Result<Credentials, ConfigurationError> {
        let missing = |key: &str| ConfigurationError::MissingSetting(key.to_string());
        Ok(Credentials {
            server: self.server.clone().ok_or_else(|| missing(ENV_SERVER))?,
            email: self.email.clone().ok_or_else(|| missing(ENV_EMAIL))?,
            api_token: self
                .api_token
                .as_ref()
                .map(|token| SecretString::new(token.expose_secret().into()))
                .ok_or_else(|| missing(ENV_API_TOKEN))?,
        })
    }

    /// Built-in aliases overlaid with configured ones
    pub fn aliases_with_defaults(&self) -> BTreeMap<String, AliasExpansion> {
        let mut aliases: BTreeMap<String, AliasExpansion> = DEFAULT_ALIASES
            .iter()
            .map(|(name, line)| (name.to_string(), AliasExpansion::Line(line.to_string())))
            .collect();
        if let Some(configured) = &self.aliases {
            aliases.extend(configured.commands.clone());
        }
        aliases
    }

    /// Template directories in search order: configured paths, then the standard locations
    pub fn template_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .templates
            .iter()
            .flat_map(|t| t.paths.iter())
            .map(|p| expand_home(p))
            .collect();
        if let Some(home_dir) = dirs::home_dir() {
            dirs.push(home_dir.join(".config").join("jira-cli").join("templates"));
            dirs.push(home_dir.join(".jira").join("templates"));
        }
        dirs
    }

    pub fn bulk_settings(&self) -> BulkSettings {
        let bulk = self.bulk.unwrap_or_default();
        BulkSettings {
            batch_size: bulk.batch_size.unwrap_or(limits::DEFAULT_BATCH_SIZE),
            concurrency: bulk.concurrency.unwrap_or(limits::DEFAULT_CONCURRENCY),
            max_results: bulk.max_results.unwrap_or(limits::DEFAULT_MAX_RESULTS),
        }
    }
}

impl ConfigAliases {
    /// Merge aliases, combining command maps
    pub fn merge(mut self, other: ConfigAliases) -> ConfigAliases {
        self.commands.extend(other.commands);
        self
    }
}

// Keeps the token wrapped from the moment it is read
fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|token| SecretString::new(token.into_boxed_str())))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
