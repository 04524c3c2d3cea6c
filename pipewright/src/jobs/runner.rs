//! The compute-backend port.

use super::{JobKind, JobSpec, TRACING_TARGET};
use crate::cancellation::CancellationToken;
use crate::core::{JobStatus, TerminalStatus};
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Reference to a job accepted by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// The job name from the spec.
    pub job_name: String,
    /// The backend's identifier for the job.
    pub id: String,
    /// Processing or training.
    pub kind: JobKind,
    /// When the backend accepted the job.
    pub submitted_at: DateTime<Utc>,
}

/// One status poll result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    /// The reported status.
    pub status: JobStatus,
    /// The backend's failure reason, if the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobProgress {
    /// Creates a progress report without a failure reason.
    #[must_use]
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            failure_reason: None,
        }
    }

    /// Creates a failed progress report.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}

/// The terminal result of waiting on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// The job waited on.
    pub handle: JobHandle,
    /// How the job ended.
    pub status: TerminalStatus,
    /// Failure or cancellation reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Number of status polls performed.
    pub polls: u32,
}

impl JobOutcome {
    /// Whether the job succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TerminalStatus::Succeeded
    }

    /// Converts a non-successful outcome into the matching error.
    ///
    /// # Errors
    ///
    /// Returns `JobFailed` or `JobCancelled` carrying the job handle.
    pub fn into_result(self) -> Result<JobHandle> {
        let reason = self.reason.unwrap_or_else(|| "no reason reported".to_string());
        match self.status {
            TerminalStatus::Succeeded => Ok(self.handle),
            TerminalStatus::Failed => Err(PipelineError::JobFailed {
                job_name: self.handle.job_name,
                handle: self.handle.id,
                reason,
            }),
            TerminalStatus::Cancelled => Err(PipelineError::JobCancelled {
                job_name: self.handle.job_name,
                handle: self.handle.id,
                reason,
            }),
        }
    }
}

/// What `submit` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// The accepted job.
    pub handle: JobHandle,
    /// The terminal outcome, if the spec asked to wait.
    pub outcome: Option<JobOutcome>,
}

/// A compute backend that runs processing and training jobs.
///
/// Implementations provide the three backend calls; waiting and submission
/// are built on top of them.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Asks the backend to create the job.
    ///
    /// # Errors
    ///
    /// Returns `Submission` if the backend rejects the request.
    async fn start(&self, spec: &JobSpec) -> Result<JobHandle>;

    /// Polls the job's status once.
    async fn status(&self, handle: &JobHandle) -> Result<JobProgress>;

    /// Asks the backend to stop the job.
    async fn cancel(&self, handle: &JobHandle) -> Result<()>;

    /// Interval between polls when the spec sets none.
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Polls until the job reaches a terminal status.
    ///
    /// If `cancellation` fires first, the job is stopped through
    /// [`cancel`](Self::cancel) and a `Cancelled` outcome is returned.
    async fn wait(
        &self,
        handle: &JobHandle,
        interval: Duration,
        cancellation: &CancellationToken,
    ) -> Result<JobOutcome> {
        let mut polls = 0;
        loop {
            if cancellation.is_cancelled() {
                let reason = cancellation.reason().unwrap_or_else(|| "cancelled".to_string());
                tracing::warn!(
                    target: TRACING_TARGET,
                    job_name = %handle.job_name,
                    reason = %reason,
                    "Stopping job after cancellation"
                );
                self.cancel(handle).await?;
                return Ok(JobOutcome {
                    handle: handle.clone(),
                    status: TerminalStatus::Cancelled,
                    reason: Some(reason),
                    polls,
                });
            }

            let progress = self.status(handle).await?;
            polls += 1;

            if let Some(status) = progress.status.terminal() {
                tracing::info!(
                    target: TRACING_TARGET,
                    job_name = %handle.job_name,
                    status = %progress.status,
                    polls,
                    "Job reached terminal status"
                );
                return Ok(JobOutcome {
                    handle: handle.clone(),
                    status,
                    reason: progress.failure_reason,
                    polls,
                });
            }

            tracing::debug!(
                target: TRACING_TARGET,
                job_name = %handle.job_name,
                status = %progress.status,
                "Job still running"
            );

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = cancellation.cancelled() => {}
            }
        }
    }

    /// Validates and starts a job, waiting for it if `spec.wait` is set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an invalid spec, `Submission` if the
    /// backend rejects it, or any error raised while polling.
    async fn submit(&self, spec: &JobSpec, cancellation: &CancellationToken) -> Result<Submission> {
        spec.validate()?;

        let handle = self.start(spec).await?;
        tracing::info!(
            target: TRACING_TARGET,
            job_name = %handle.job_name,
            kind = %handle.kind,
            id = %handle.id,
            "Job submitted"
        );

        if !spec.wait {
            return Ok(Submission { handle, outcome: None });
        }

        let interval = spec.check_interval().unwrap_or_else(|| self.poll_interval());
        let outcome = self.wait(&handle, interval, cancellation).await?;
        Ok(Submission {
            handle,
            outcome: Some(outcome),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::ResourceConfig;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedRunner {
        statuses: Mutex<VecDeque<JobProgress>>,
        cancels: AtomicUsize,
    }

    impl ScriptedRunner {
        fn with(statuses: Vec<JobProgress>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                cancels: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobRunner for ScriptedRunner {
        async fn start(&self, spec: &JobSpec) -> Result<JobHandle> {
            Ok(JobHandle {
                job_name: spec.job_name.clone(),
                id: format!("arn:test/{}", spec.job_name),
                kind: spec.kind,
                submitted_at: Utc::now(),
            })
        }

        async fn status(&self, _handle: &JobHandle) -> Result<JobProgress> {
            Ok(self
                .statuses
                .lock()
                .pop_front()
                .unwrap_or_else(|| JobProgress::new(JobStatus::InProgress)))
        }

        async fn cancel(&self, _handle: &JobHandle) -> Result<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_millis(1)
        }
    }

    fn spec(wait: bool) -> JobSpec {
        let mut spec = JobSpec::new(
            "job-1",
            JobKind::Training,
            "img",
            "role",
            ResourceConfig {
                instance_count: 1,
                instance_type: "ml.m5.2xlarge".to_string(),
                volume_size_in_gb: 5,
            },
        );
        spec.wait = wait;
        spec
    }

    #[tokio::test]
    async fn test_wait_until_completed() {
        let runner = ScriptedRunner::with(vec![
            JobProgress::new(JobStatus::Pending),
            JobProgress::new(JobStatus::InProgress),
            JobProgress::new(JobStatus::Completed),
        ]);

        let submission = runner.submit(&spec(true), &CancellationToken::new()).await.unwrap();
        let outcome = submission.outcome.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.polls, 3);
    }

    #[tokio::test]
    async fn test_failed_outcome_maps_to_job_failed() {
        let runner = ScriptedRunner::with(vec![JobProgress::failed("AlgorithmError: bad label")]);

        let outcome = runner
            .submit(&spec(true), &CancellationToken::new())
            .await
            .unwrap()
            .outcome
            .unwrap();

        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.code(), "JOB-FAILED");
        assert_eq!(err.job_handle(), Some("arn:test/job-1"));
        assert!(err.to_string().contains("AlgorithmError"));
    }

    #[tokio::test]
    async fn test_no_wait_returns_immediately() {
        let runner = ScriptedRunner::with(Vec::new());
        let submission = runner.submit(&spec(false), &CancellationToken::new()).await.unwrap();

        assert!(submission.outcome.is_none());
        assert_eq!(submission.handle.job_name, "job-1");
    }

    #[tokio::test]
    async fn test_cancellation_stops_job() {
        let runner = Arc::new(ScriptedRunner::default());
        let token = Arc::new(CancellationToken::new());

        let waiter = {
            let runner = Arc::clone(&runner);
            let token = Arc::clone(&token);
            tokio::spawn(async move {
                let handle = runner.start(&spec(true)).await.unwrap();
                runner.wait(&handle, Duration::from_secs(3600), &token).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel("scheduler stopped the run");

        let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(outcome.status, TerminalStatus::Cancelled);
        assert_eq!(outcome.reason.as_deref(), Some("scheduler stopped the run"));
        assert_eq!(runner.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_is_not_started() {
        let runner = ScriptedRunner::default();
        let mut bad = spec(true);
        bad.job_name = "has spaces".to_string();

        let err = runner.submit(&bad, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG-INVALID");
    }
}
