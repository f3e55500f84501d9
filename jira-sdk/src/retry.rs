// ABOUTME: Retry logic with exponential backoff for handling transient failures
// ABOUTME: Models each retried request as an explicit Pending/Attempting/Retrying state machine

use crate::constants::retry;
use crate::error::JiraError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// When false, timeouts and connection errors end the request instead of retrying it
    pub idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            initial_delay: retry::INITIAL_DELAY,
            max_delay: retry::MAX_DELAY,
            backoff_multiplier: retry::BACKOFF_MULTIPLIER,
            idempotent: true,
        }
    }
}

impl RetryConfig {
    /// Same bound as the default policy, but without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            idempotent: true,
        }
    }

    /// The same policy for requests that must not be sent twice, such as adding a comment
    pub fn non_idempotent(&self) -> Self {
        Self {
            idempotent: false,
            ..self.clone()
        }
    }

    pub fn should_retry(&self, error: &JiraError) -> bool {
        if self.idempotent {
            error.is_retryable()
        } else {
            error.is_transient()
        }
    }

    /// Delay before the attempt that follows `failed_attempt` (1-based)
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        std::cmp::min(Duration::from_millis(millis as u64), self.max_delay)
    }
}

/// Lifecycle of one retried request
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState {
    Pending,
    Attempting {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
        last_error: JiraError,
    },
    Succeeded {
        attempts: u32,
    },
    Failed {
        attempts: u32,
        error: JiraError,
    },
}

impl RetryState {
    /// Start the next attempt. Terminal and in-flight states are returned unchanged.
    pub fn begin(self) -> Self {
        match self {
            RetryState::Pending => RetryState::Attempting { attempt: 1 },
            RetryState::Retrying { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn succeed(self) -> Self {
        match self {
            RetryState::Attempting { attempt } => RetryState::Succeeded { attempts: attempt },
            other => other,
        }
    }

    /// Record a failed attempt; transient errors retry until the attempt bound is hit
    pub fn fail(self, error: JiraError, config: &RetryConfig) -> Self {
        match self {
            RetryState::Attempting { attempt } => {
                if config.should_retry(&error) && attempt < config.max_attempts {
                    let backoff = config.delay_after(attempt);
                    let delay = error
                        .retry_after()
                        .map(|hint| std::cmp::min(std::cmp::max(hint, backoff), config.max_delay))
                        .unwrap_or(backoff);
                    RetryState::Retrying {
                        attempt,
                        delay,
                        last_error: error,
                    }
                } else {
                    RetryState::Failed {
                        attempts: attempt,
                        error,
                    }
                }
            }
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Failed { .. }
        )
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        match self {
            RetryState::Pending => 0,
            RetryState::Attempting { attempt } | RetryState::Retrying { attempt, .. } => *attempt,
            RetryState::Succeeded { attempts } | RetryState::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Result of a retried operation together with the number of attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, JiraError>,
    pub attempts: u32,
}

pub async fn execute_with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JiraError>>,
{
    let mut state = RetryState::Pending;
    let mut output = None;

    loop {
        state = match state {
            RetryState::Pending => state.begin(),
            RetryState::Attempting { .. } => match operation().await {
                Ok(value) => {
                    output = Some(value);
                    state.succeed()
                }
                Err(error) => state.fail(error, config),
            },
            RetryState::Retrying {
                attempt,
                delay,
                ref last_error,
            } => {
                debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying transient failure"
                );
                sleep(delay).await;
                state.begin()
            }
            RetryState::Succeeded { attempts } => {
                let result = output.ok_or_else(|| {
                    JiraError::InvalidResponse("operation finished without a value".to_string())
                });
                return Attempted { result, attempts };
            }
            RetryState::Failed { attempts, error } => {
                return Attempted {
                    result: Err(error),
                    attempts,
                };
            }
        };
    }
}

pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, JiraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JiraError>>,
{
    execute_with_retry(config, operation).await.result
}
