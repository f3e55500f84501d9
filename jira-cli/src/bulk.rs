// ABOUTME: Bulk operation executor: search, confirm, then batched mutation with retry
// ABOUTME: Per-issue failures are collected into the result instead of aborting the job

use futures_util::future::ready;
use futures_util::stream::{self, StreamExt};
use jira_sdk::{
    IssueUpdate, JiraError, RetryConfig, SearchRequest, TrackerClient, execute_with_retry,
    retry_with_backoff,
};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::limits;
use crate::error::{CliError, ConfigurationError, Result};

/// One mutation applied to every issue matched by a bulk job
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    UpdateFields(IssueUpdate),
    Transition {
        name: String,
        resolution: Option<String>,
    },
    Delete,
    AddComment(String),
    AddWatcher(String),
}

impl BulkOperation {
    async fn apply(&self, client: &dyn TrackerClient, key: &str) -> std::result::Result<(), JiraError> {
        match self {
            BulkOperation::UpdateFields(update) => client.update_fields(key, update).await,
            BulkOperation::Transition { name, resolution } => {
                client.transition(key, name, resolution.as_deref()).await
            }
            BulkOperation::Delete => client.delete_issue(key).await,
            BulkOperation::AddComment(body) => client.add_comment(key, body).await,
            BulkOperation::AddWatcher(account_id) => client.add_watcher(key, account_id).await,
        }
    }

    /// Repeating the request leaves the issue as a single request would
    fn is_idempotent(&self) -> bool {
        matches!(
            self,
            BulkOperation::UpdateFields(_) | BulkOperation::AddWatcher(_)
        )
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkOperation::UpdateFields(update) => {
                let mut names: Vec<&str> = update.fields.keys().map(String::as_str).collect();
                if !update.add_labels.is_empty() {
                    names.push("labels");
                }
                write!(f, "update {}", names.join(", "))
            }
            BulkOperation::Transition {
                name,
                resolution: Some(resolution),
            } => write!(f, "transition to '{name}' (resolution {resolution})"),
            BulkOperation::Transition { name, .. } => write!(f, "transition to '{name}'"),
            BulkOperation::Delete => f.write_str("delete"),
            BulkOperation::AddComment(_) => f.write_str("add comment"),
            BulkOperation::AddWatcher(account_id) => write!(f, "add watcher {account_id}"),
        }
    }
}

/// A bulk mutation over every issue matching `query`
#[derive(Debug, Clone, PartialEq)]
pub struct BulkJob {
    pub query: String,
    /// Applied to each issue in order; the first failure skips the rest for that issue
    pub operations: Vec<BulkOperation>,
    pub batch_size: usize,
    pub requires_confirmation: bool,
    pub max_results: usize,
    pub concurrency: usize,
}

impl BulkJob {
    pub fn new(query: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            query: query.into(),
            operations: vec![operation],
            batch_size: limits::DEFAULT_BATCH_SIZE,
            requires_confirmation: true,
            max_results: limits::DEFAULT_MAX_RESULTS,
            concurrency: limits::DEFAULT_CONCURRENCY,
        }
    }

    pub fn then(mut self, operation: BulkOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn skip_confirmation(mut self) -> Self {
        self.requires_confirmation = false;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |key: &str, reason: &str| -> Result<()> {
            Err(CliError::from(ConfigurationError::InvalidValue {
                key: key.to_string(),
                reason: reason.to_string(),
            }))
        };
        if self.operations.is_empty() {
            return invalid("operation", "a bulk job needs at least one operation");
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be greater than zero");
        }
        if self.concurrency == 0 {
            return invalid("concurrency", "must be greater than zero");
        }
        if self.max_results == 0 {
            return invalid("max_results", "must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Declined,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Planned,
    Searching,
    Confirming,
    Executing,
    Completed,
    Aborted(AbortReason),
}

impl JobState {
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Planned, Searching)
                | (Searching, Confirming)
                | (Searching, Executing)
                | (Searching, Completed)
                | (Confirming, Executing)
                | (Confirming, Aborted(AbortReason::Declined))
                | (Executing, Completed)
                | (Executing, Aborted(AbortReason::Cancelled))
        )
    }

    pub fn advance(self, next: JobState) -> JobState {
        debug_assert!(
            self.can_advance_to(next),
            "illegal bulk job transition {self:?} -> {next:?}"
        );
        debug!("Bulk job {:?} -> {:?}", self, next);
        next
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Aborted(_))
    }
}

/// What a job would touch, shown before anything is mutated
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedImpact {
    pub query: String,
    pub count: usize,
    pub operations: Vec<BulkOperation>,
    /// First few keys in search order
    pub sample: Vec<String>,
}

impl PlannedImpact {
    fn new(job: &BulkJob, keys: &[String]) -> Self {
        Self {
            query: job.query.clone(),
            count: keys.len(),
            operations: job.operations.clone(),
            sample: keys
                .iter()
                .take(limits::CONFIRMATION_SAMPLE_SIZE)
                .cloned()
                .collect(),
        }
    }
}

/// Decides whether a planned job may proceed
pub trait ConfirmationGate: Send + Sync {
    fn confirm(&self, impact: &PlannedImpact) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: Fn(&PlannedImpact) -> bool + Send + Sync,
{
    fn confirm(&self, impact: &PlannedImpact) -> bool {
        self(impact)
    }
}

/// Gate used for `--yes`
pub struct AutoApprove;

impl ConfirmationGate for AutoApprove {
    fn confirm(&self, _impact: &PlannedImpact) -> bool {
        true
    }
}

/// Cooperative cancellation shared between the executor and a signal handler
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResult {
    pub attempted: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, JiraError)>,
    /// Keys never dispatched because the job was cancelled
    pub not_attempted: Vec<String>,
}

impl BulkResult {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub state: JobState,
    pub result: BulkResult,
}

/// Invoked with the number of issues finished by each completed batch
pub type ProgressCallback = Arc<dyn Fn(usize) + Send + Sync>;

struct IssueOutcome {
    index: usize,
    key: String,
    result: std::result::Result<(), JiraError>,
}

pub struct BulkOperationExecutor {
    client: Arc<dyn TrackerClient>,
    retry: RetryConfig,
    progress: Option<ProgressCallback>,
}

impl BulkOperationExecutor {
    pub fn new(client: Arc<dyn TrackerClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
            progress: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Issue keys matching the job's query, in search order
    pub async fn search(&self, job: &BulkJob) -> Result<Vec<String>> {
        let request = SearchRequest::new(job.query.clone(), limits::SEARCH_PAGE_SIZE);
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.as_deref();
            let page = retry_with_backoff(&self.retry, || self.client.search(&request, token)).await?;
            debug!(
                "Fetched search page with {} issues (total {})",
                page.issues.len(),
                keys.len() + page.issues.len()
            );
            keys.extend(page.issues.into_iter().map(|issue| issue.key));
            if keys.len() > job.max_results {
                return Err(CliError::ResultSetTooLarge {
                    cap: job.max_results,
                });
            }

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    return Err(JiraError::InvalidResponse(
                        "search returned the same page token twice".to_string(),
                    )
                    .into());
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }

    /// Search only and describe what the job would do
    pub async fn plan(&self, job: &BulkJob) -> Result<PlannedImpact> {
        job.validate()?;
        let keys = self.search(job).await?;
        Ok(PlannedImpact::new(job, &keys))
    }

    pub async fn execute(
        &self,
        job: &BulkJob,
        gate: &dyn ConfirmationGate,
        cancel: &CancellationFlag,
    ) -> Result<BulkReport> {
        job.validate()?;
        let mut state = JobState::Planned.advance(JobState::Searching);
        let keys = self.search(job).await?;
        info!("Bulk job matched {} issues", keys.len());

        if keys.is_empty() {
            return Ok(BulkReport {
                state: state.advance(JobState::Completed),
                result: BulkResult::default(),
            });
        }

        if job.requires_confirmation {
            state = state.advance(JobState::Confirming);
            if !gate.confirm(&PlannedImpact::new(job, &keys)) {
                return Ok(BulkReport {
                    state: state.advance(JobState::Aborted(AbortReason::Declined)),
                    result: BulkResult {
                        not_attempted: keys,
                        ..BulkResult::default()
                    },
                });
            }
        }
        state = state.advance(JobState::Executing);

        let batches: Vec<Vec<(usize, String)>> = keys
            .iter()
            .cloned()
            .enumerate()
            .collect::<Vec<_>>()
            .chunks(job.batch_size)
            .map(<[(usize, String)]>::to_vec)
            .collect();
        debug!(
            "Dispatching {} batches of up to {} issues, {} at a time",
            batches.len(),
            job.batch_size,
            job.concurrency
        );

        let mut outcomes: Vec<IssueOutcome> = stream::iter(batches)
            .take_while(|_| ready(!cancel.is_cancelled()))
            .map(|batch| self.run_batch(job, batch))
            .buffer_unordered(job.concurrency)
            .flat_map(stream::iter)
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.index);

        let dispatched: HashSet<usize> = outcomes.iter().map(|o| o.index).collect();
        let mut result = BulkResult {
            attempted: outcomes.len(),
            not_attempted: keys
                .iter()
                .enumerate()
                .filter(|(index, _)| !dispatched.contains(index))
                .map(|(_, key)| key.clone())
                .collect(),
            ..BulkResult::default()
        };
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => result.succeeded.push(outcome.key),
                Err(error) => result.failed.push((outcome.key, error)),
            }
        }

        let state = if result.not_attempted.is_empty() {
            state.advance(JobState::Completed)
        } else {
            warn!(
                "Bulk job cancelled with {} issues not attempted",
                result.not_attempted.len()
            );
            state.advance(JobState::Aborted(AbortReason::Cancelled))
        };

        Ok(BulkReport { state, result })
    }

    /// Issues in a batch run one after another; each operation step has its own retry budget
    async fn run_batch(&self, job: &BulkJob, batch: Vec<(usize, String)>) -> Vec<IssueOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        let strict = self.retry.non_idempotent();

        for (index, key) in batch {
            let mut result = Ok(());
            for operation in &job.operations {
                let retry = if operation.is_idempotent() {
                    &self.retry
                } else {
                    &strict
                };
                let attempted =
                    execute_with_retry(retry, || operation.apply(self.client.as_ref(), &key))
                        .await;
                if let Err(error) = attempted.result {
                    warn!(
                        "{} failed for {} after {} attempt(s): {}",
                        operation, key, attempted.attempts, error
                    );
                    result = Err(error);
                    break;
                }
            }
            outcomes.push(IssueOutcome { index, key, result });
        }

        if let Some(progress) = &self.progress {
            progress(outcomes.len());
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTracker;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn executor(mock: &Arc<MockTracker>) -> BulkOperationExecutor {
        BulkOperationExecutor::new(mock.clone()).with_retry(RetryConfig::immediate(3))
    }

    fn comment_job() -> BulkJob {
        BulkJob::new("project = \"DATA\"", BulkOperation::AddComment("hi".to_string()))
            .skip_confirmation()
    }

    fn keys(prefix: &str, range: std::ops::RangeInclusive<usize>) -> Vec<String> {
        range.map(|n| format!("{prefix}-{n}")).collect()
    }

    fn validation_error() -> JiraError {
        JiraError::Validation("Field 'assignee' cannot be set".to_string())
    }

    #[tokio::test]
    async fn test_all_issues_succeed_in_search_order() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 23));
        let job = comment_job().with_batch_size(5).with_concurrency(4);

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.result.attempted, 23);
        assert_eq!(report.result.succeeded, keys("DATA", 1..=23));
        assert!(report.result.failed.is_empty());
        assert!(report.result.not_attempted.is_empty());
    }

    #[tokio::test]
    async fn test_failing_batch_is_isolated() {
        let mut mock = MockTracker::new().with_issues("DATA", 12);
        for key in keys("DATA", 5..=8) {
            mock = mock.fail_always(&key, validation_error());
        }
        let mock = Arc::new(mock);
        let job = comment_job().with_batch_size(4);

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.result.attempted, 12);
        let failed: Vec<&str> = report.result.failed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(failed, vec!["DATA-5", "DATA-6", "DATA-7", "DATA-8"]);
        assert!(report.result.failed.iter().all(|(_, e)| *e == validation_error()));
        let mut expected = keys("DATA", 1..=4);
        expected.extend(keys("DATA", 9..=12));
        assert_eq!(report.result.succeeded, expected);
        // Non-transient failures are not retried
        assert_eq!(mock.attempts_for("DATA-5"), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_within_bound() {
        let transient = JiraError::RateLimit { retry_after: None };
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 3)
                .fail_times("DATA-2", 2, transient.clone())
                .fail_times(
                    "DATA-3",
                    5,
                    JiraError::Server {
                        status: 503,
                        message: "unavailable".to_string(),
                    },
                ),
        );

        let report = executor(&mock)
            .execute(&comment_job(), &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.result.succeeded, vec!["DATA-1", "DATA-2"]);
        assert_eq!(mock.attempts_for("DATA-2"), 3);
        assert_eq!(report.result.failed.len(), 1);
        assert_eq!(report.result.failed[0].0, "DATA-3");
        assert_eq!(mock.attempts_for("DATA-3"), 3);
    }

    #[tokio::test]
    async fn test_timeout_on_comment_is_not_resent() {
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 2)
                .fail_times("DATA-1", 1, JiraError::Timeout),
        );

        let report = executor(&mock)
            .execute(&comment_job(), &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.result.failed, vec![("DATA-1".to_string(), JiraError::Timeout)]);
        assert_eq!(mock.attempts_for("DATA-1"), 1);
        assert_eq!(report.result.succeeded, vec!["DATA-2"]);
    }

    #[tokio::test]
    async fn test_timeout_on_field_update_is_retried() {
        let mut update = IssueUpdate::default();
        update.fields.insert("priority".to_string(), json!({"name": "Low"}));
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 1)
                .fail_times("DATA-1", 1, JiraError::Timeout),
        );
        let job = BulkJob::new("project = \"DATA\"", BulkOperation::UpdateFields(update))
            .skip_confirmation();

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.result.succeeded, vec!["DATA-1"]);
        assert_eq!(mock.attempts_for("DATA-1"), 2);
    }

    #[tokio::test]
    async fn test_results_keep_search_order_when_later_batches_finish_first() {
        let mut mock = MockTracker::new()
            .with_issues("DATA", 12)
            .fail_always("DATA-2", validation_error())
            .fail_always("DATA-11", validation_error());
        // Earlier batches are slower, so batches complete in reverse order
        for (batch, millis) in [(1..=3, 60), (4..=6, 40), (7..=9, 20)] {
            for key in keys("DATA", batch) {
                mock = mock.with_delay(&key, Duration::from_millis(millis));
            }
        }
        let mock = Arc::new(mock);
        let job = comment_job().with_batch_size(3).with_concurrency(4);

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(mock.applied_keys().first().map(String::as_str), Some("DATA-10"));
        let mut expected = vec!["DATA-1".to_string()];
        expected.extend(keys("DATA", 3..=10));
        expected.push("DATA-12".to_string());
        assert_eq!(report.result.succeeded, expected);
        let failed: Vec<&str> = report.result.failed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(failed, vec!["DATA-2", "DATA-11"]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_batches() {
        let cancel = CancellationFlag::new();
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 10)
                .cancel_after(1, cancel.clone()),
        );
        let job = comment_job().with_batch_size(2).with_concurrency(1);

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &cancel)
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Aborted(AbortReason::Cancelled));
        assert_eq!(report.result.attempted, 2);
        assert_eq!(report.result.succeeded, keys("DATA", 1..=2));
        assert_eq!(report.result.not_attempted, keys("DATA", 3..=10));
        assert_eq!(
            report.result.attempted + report.result.not_attempted.len(),
            10
        );
    }

    #[tokio::test]
    async fn test_declined_confirmation_mutates_nothing() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 15));
        let seen = Arc::new(Mutex::new(None));
        let seen_in_gate = seen.clone();
        let gate = move |impact: &PlannedImpact| {
            *seen_in_gate.lock().unwrap() = Some(impact.clone());
            false
        };
        let job = BulkJob::new("project = \"DATA\"", BulkOperation::Delete);

        let report = executor(&mock)
            .execute(&job, &gate, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Aborted(AbortReason::Declined));
        assert!(mock.applied_keys().is_empty());
        assert_eq!(report.result.not_attempted.len(), 15);
        let impact = seen.lock().unwrap().clone().unwrap();
        assert_eq!(impact.count, 15);
        assert_eq!(impact.sample, keys("DATA", 1..=10));
        assert_eq!(impact.operations, vec![BulkOperation::Delete]);
    }

    #[tokio::test]
    async fn test_zero_results_complete_without_confirmation() {
        let mock = Arc::new(MockTracker::new());
        let gate = |_: &PlannedImpact| -> bool { panic!("gate must not be consulted") };
        let job = BulkJob::new("project = \"NONE\"", BulkOperation::Delete);

        let report = executor(&mock)
            .execute(&job, &gate, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.result, BulkResult::default());
    }

    #[tokio::test]
    async fn test_result_cap() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 120));
        let job = comment_job().with_max_results(100);

        let err = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap_err();

        assert_eq!(err, CliError::ResultSetTooLarge { cap: 100 });
        assert!(mock.applied_keys().is_empty());

        let raised = comment_job().with_max_results(200);
        let report = executor(&mock)
            .execute(&raised, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(report.result.succeeded.len(), 120);
    }

    #[tokio::test]
    async fn test_search_is_paged_and_retried() {
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 120)
                .fail_search_once(JiraError::Timeout),
        );

        let keys = executor(&mock).search(&comment_job()).await.unwrap();

        assert_eq!(keys.len(), 120);
        // One failed attempt plus three pages of 50
        assert_eq!(mock.search_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_search_hard_failure_propagates() {
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 3)
                .fail_search_once(JiraError::Auth("expired".to_string())),
        );

        let err = executor(&mock)
            .execute(&comment_job(), &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Remote(JiraError::Auth(_))));
    }

    #[tokio::test]
    async fn test_operations_apply_in_order_and_stop_on_failure() {
        let mut update = IssueUpdate::default();
        update.fields.insert("priority".to_string(), json!({"name": "High"}));
        let mock = Arc::new(
            MockTracker::new()
                .with_issues("DATA", 2)
                .fail_always("DATA-2", validation_error()),
        );
        let job = BulkJob::new("project = \"DATA\"", BulkOperation::UpdateFields(update))
            .then(BulkOperation::Transition {
                name: "done".to_string(),
                resolution: None,
            })
            .skip_confirmation();

        let report = executor(&mock)
            .execute(&job, &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.result.succeeded, vec!["DATA-1"]);
        assert_eq!(
            *mock.applied.lock().unwrap(),
            vec![
                ("DATA-1".to_string(), "update:priority".to_string()),
                ("DATA-1".to_string(), "transition:31".to_string()),
            ]
        );
        assert_eq!(mock.attempts_for("DATA-2"), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_mutate() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 4));
        let impact = executor(&mock).plan(&comment_job()).await.unwrap();

        assert_eq!(impact.count, 4);
        assert!(mock.applied_keys().is_empty());
    }

    #[tokio::test]
    async fn test_progress_reports_every_issue() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 9));
        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        let executor = executor(&mock).with_progress(Arc::new(move |n| {
            counter.fetch_add(n, Ordering::SeqCst);
        }));

        executor
            .execute(&comment_job().with_batch_size(4), &AutoApprove, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_invalid_job_is_rejected() {
        let mock = Arc::new(MockTracker::new().with_issues("DATA", 1));
        let job = comment_job().with_batch_size(0);
        assert!(matches!(
            executor(&mock)
                .execute(&job, &AutoApprove, &CancellationFlag::new())
                .await,
            Err(CliError::Configuration(ConfigurationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_state_machine_transitions() {
        assert!(JobState::Planned.can_advance_to(JobState::Searching));
        assert!(JobState::Searching.can_advance_to(JobState::Executing));
        assert!(JobState::Confirming.can_advance_to(JobState::Aborted(AbortReason::Declined)));
        assert!(!JobState::Planned.can_advance_to(JobState::Executing));
        assert!(!JobState::Completed.can_advance_to(JobState::Executing));
        assert!(!JobState::Executing.can_advance_to(JobState::Aborted(AbortReason::Declined)));
        assert!(JobState::Aborted(AbortReason::Cancelled).is_terminal());
    }

    #[test]
    fn test_operation_display() {
        let mut update = IssueUpdate::default();
        update.fields.insert("assignee".to_string(), json!({"accountId": "a"}));
        update.add_labels.push("x".to_string());
        assert_eq!(
            BulkOperation::UpdateFields(update).to_string(),
            "update assignee, labels"
        );
        assert_eq!(
            BulkOperation::Transition {
                name: "Done".to_string(),
                resolution: Some("Fixed".to_string())
            }
            .to_string(),
            "transition to 'Done' (resolution Fixed)"
        );
    }
}
