// ABOUTME: Custom error types for Jira SDK with user-friendly messages
// ABOUTME: Maps HTTP failures onto a small set of status categories and retry hints

use http::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::constants::errors;

/// Coarse classification every tracker failure falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Auth,
    RateLimit,
    NotFound,
    Validation,
    Server,
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCategory::Auth => "auth",
            StatusCategory::RateLimit => "rateLimit",
            StatusCategory::NotFound => "notFound",
            StatusCategory::Validation => "validation",
            StatusCategory::Server => "server",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JiraError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Please wait before making more requests")]
    RateLimit { retry_after: Option<Duration> },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: Request took too long to complete")]
    Timeout,

    #[error("Invalid API response format: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Error body shape returned by the Jira REST API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: std::collections::BTreeMap<String, String>,
}

impl ErrorBody {
    fn summarize(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let mut parts = parsed.error_messages;
        parts.extend(
            parsed
                .errors
                .into_iter()
                .map(|(field, message)| format!("{field}: {message}")),
        );
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

impl JiraError {
    /// Build an error from a non-success HTTP response
    pub fn from_status(status: StatusCode, body: &str, retry_after: Option<Duration>) -> Self {
        let message = ErrorBody::summarize(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

        match status.as_u16() {
            401 | 403 => JiraError::Auth(message),
            404 => JiraError::NotFound(message),
            429 => JiraError::RateLimit { retry_after },
            code if (errors::SERVER_ERROR_MIN..=errors::SERVER_ERROR_MAX).contains(&code) => {
                JiraError::Server {
                    status: code,
                    message,
                }
            }
            _ => JiraError::Validation(message),
        }
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            JiraError::Auth(_) => StatusCategory::Auth,
            JiraError::NotFound(_) => StatusCategory::NotFound,
            JiraError::RateLimit { .. } => StatusCategory::RateLimit,
            JiraError::Validation(_)
            | JiraError::InvalidResponse(_)
            | JiraError::Configuration(_) => StatusCategory::Validation,
            JiraError::Server { .. } | JiraError::Network(_) | JiraError::Timeout => {
                StatusCategory::Server
            }
        }
    }

    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            JiraError::Auth(_) => Some(
                "Check JIRA_EMAIL and JIRA_API_TOKEN. Create a token at https://id.atlassian.com/manage/api-tokens",
            ),
            JiraError::NotFound(_) => {
                Some("Please check the issue key format (e.g., PROJ-123) and your project access")
            }
            JiraError::Network(_) => Some("Check your internet connection and JIRA_SERVER"),
            JiraError::RateLimit { .. } => Some("Wait a moment before making another request"),
            JiraError::Timeout => Some("Try again or check your network connection"),
            JiraError::Configuration(_) => {
                Some("Set JIRA_SERVER, JIRA_EMAIL and JIRA_API_TOKEN or add them to your config file")
            }
            _ => None,
        }
    }

    /// Rate-limit and 5xx responses; any request may be retried after one
    pub fn is_transient(&self) -> bool {
        matches!(self, JiraError::RateLimit { .. } | JiraError::Server { .. })
    }

    /// Transient failures plus timeouts and dropped connections. The latter leave it
    /// unknown whether the server applied the request, so only idempotent calls retry them.
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || matches!(self, JiraError::Network(_) | JiraError::Timeout)
    }

    /// Server-suggested wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            JiraError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for JiraError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JiraError::Timeout
        } else if err.is_decode() {
            JiraError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            JiraError::from_status(status, "", None)
        } else {
            JiraError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JiraError {
    fn from(err: serde_json::Error) -> Self {
        JiraError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for JiraError {
    fn from(err: url::ParseError) -> Self {
        JiraError::Configuration(format!("Invalid URL: {err}"))
    }
}
