// ABOUTME: Builder pattern implementation for JiraClient configuration
// ABOUTME: Provides type-safe configuration with compile-time validation

use crate::JiraClient;
use crate::constants::timeouts;
use crate::error::JiraError;
use secrecy::SecretString;
use std::time::Duration;
use typed_builder::TypedBuilder;
use url::Url;

#[derive(Debug, TypedBuilder)]
#[builder(build_method(into = Result<JiraClient, JiraError>))]
pub struct JiraClientConfig {
    /// Jira site, e.g. https://your-domain.atlassian.net
    #[builder(setter(into))]
    pub base_url: String,

    #[builder(setter(into))]
    pub email: String,

    pub api_token: SecretString,

    #[builder(default = timeouts::HTTP_REQUEST_TIMEOUT)]
    pub timeout: Duration,

    #[builder(default = None)]
    pub proxy: Option<String>,
}

impl From<JiraClientConfig> for Result<JiraClient, JiraError> {
    fn from(config: JiraClientConfig) -> Self {
        JiraClient::from_config(config)
    }
}

impl JiraClient {
    pub fn builder() -> JiraClientConfigBuilder<((), (), (), (), ())> {
        JiraClientConfig::builder()
    }

    pub fn create_proxy(url: &str) -> Result<reqwest::Proxy, JiraError> {
        let parsed_url = Url::parse(url)
            .map_err(|e| JiraError::Configuration(format!("Invalid proxy URL: {}", e)))?;

        reqwest::Proxy::all(parsed_url.as_str())
            .map_err(|e| JiraError::Configuration(format!("Invalid proxy configuration: {}", e)))
    }
}
