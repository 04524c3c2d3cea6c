//! In-process compute backend with scripted job outcomes.

use super::{JobHandle, JobKind, JobProgress, JobRunner, JobSpec, TRACING_TARGET};
use crate::core::JobStatus;
use crate::errors::{PipelineError, Result};
use crate::storage::{ArtifactStore, StorageUri};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a simulated job behaves once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobBehavior {
    /// Completes on the given poll (1-based).
    Succeed {
        /// Poll on which the job reports `Completed`.
        after_polls: u32,
    },
    /// Fails on the given poll with a reason.
    Fail {
        /// Poll on which the job reports `Failed`.
        after_polls: u32,
        /// The reported failure reason.
        reason: String,
    },
    /// The backend refuses to create the job.
    Reject {
        /// The rejection reason.
        reason: String,
    },
    /// Runs until stopped.
    Hang,
}

impl Default for JobBehavior {
    fn default() -> Self {
        Self::Succeed { after_polls: 1 }
    }
}

#[derive(Debug)]
struct SimulatedJob {
    spec: JobSpec,
    behavior: JobBehavior,
    polls: u32,
    status: JobStatus,
}

/// A [`JobRunner`] that simulates the backend in memory.
///
/// When a job completes its outputs are written into the attached store the
/// way a real backend would: processing output lands under a backend-chosen
/// path below `{destination}/{job_name}/`, training output at
/// `{destination}/{job_name}/output/model.tar.gz`.
pub struct InMemoryJobRunner {
    jobs: DashMap<String, SimulatedJob>,
    behaviors: DashMap<JobKind, JobBehavior>,
    store: Option<Arc<dyn ArtifactStore>>,
    output_parts: usize,
    poll_interval: Duration,
    submitted: RwLock<Vec<JobSpec>>,
    cancelled: RwLock<Vec<String>>,
}

impl fmt::Debug for InMemoryJobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryJobRunner")
            .field("jobs", &self.jobs.len())
            .field("output_parts", &self.output_parts)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryJobRunner {
    fn default() -> Self {
        Self {
            jobs: DashMap::new(),
            behaviors: DashMap::new(),
            store: None,
            output_parts: 2,
            poll_interval: Duration::from_millis(5),
            submitted: RwLock::new(Vec::new()),
            cancelled: RwLock::new(Vec::new()),
        }
    }
}

impl InMemoryJobRunner {
    /// Creates a runner whose jobs succeed on the first poll and write nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialises job outputs into `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Scripts the behavior of jobs of one kind.
    #[must_use]
    pub fn with_behavior(self, kind: JobKind, behavior: JobBehavior) -> Self {
        self.behaviors.insert(kind, behavior);
        self
    }

    /// Sets how many part files a processing job writes.
    #[must_use]
    pub fn with_output_parts(mut self, parts: usize) -> Self {
        self.output_parts = parts;
        self
    }

    /// Sets the default poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns every spec the runner accepted, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.read().clone()
    }

    /// Returns the names of jobs a stop was requested for.
    #[must_use]
    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.cancelled.read().clone()
    }

    fn behavior_for(&self, kind: JobKind) -> JobBehavior {
        self.behaviors.get(&kind).map(|b| b.value().clone()).unwrap_or_default()
    }

    async fn materialize(&self, spec: &JobSpec) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        for output in &spec.outputs {
            let root = StorageUri::parse(&output.destination_uri)?.join(&spec.job_name);
            match spec.kind {
                JobKind::Processing => {
                    let run_dir = uuid::Uuid::new_v4().simple().to_string();
                    for part in 0..self.output_parts {
                        let uri = root.join(&run_dir[..8]).join(&format!("part-{part:05}.csv"));
                        let body = format!("label,amount\n{part},{}\n", 100 + part);
                        store.put(&uri.to_string(), body.into_bytes()).await?;
                    }
                }
                JobKind::Training => {
                    let uri = root.join("output/model.tar.gz");
                    store.put(&uri.to_string(), b"model-archive".to_vec()).await?;
                }
            }
        }

        tracing::debug!(target: TRACING_TARGET, job_name = %spec.job_name, "Materialised job outputs");
        Ok(())
    }
}

#[async_trait]
impl JobRunner for InMemoryJobRunner {
    async fn start(&self, spec: &JobSpec) -> Result<JobHandle> {
        let behavior = self.behavior_for(spec.kind);
        if let JobBehavior::Reject { reason } = &behavior {
            return Err(PipelineError::submission(&spec.job_name, reason.clone()));
        }

        let id = format!("arn:pipewright:{}-job/{}", spec.kind, spec.job_name);
        if self.jobs.contains_key(&id) {
            return Err(PipelineError::submission(&spec.job_name, "job name already in use"));
        }

        self.jobs.insert(
            id.clone(),
            SimulatedJob {
                spec: spec.clone(),
                behavior,
                polls: 0,
                status: JobStatus::Pending,
            },
        );
        self.submitted.write().push(spec.clone());

        Ok(JobHandle {
            job_name: spec.job_name.clone(),
            id,
            kind: spec.kind,
            submitted_at: Utc::now(),
        })
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobProgress> {
        let (progress, completed_spec) = {
            let mut job = self
                .jobs
                .get_mut(&handle.id)
                .ok_or_else(|| PipelineError::submission(&handle.job_name, "unknown job"))?;

            if job.status.is_terminal() || job.status == JobStatus::Stopping {
                if job.status == JobStatus::Stopping {
                    job.status = JobStatus::Stopped;
                }
                (JobProgress::new(job.status), None)
            } else {
                job.polls += 1;
                let polls = job.polls;
                match job.behavior.clone() {
                    JobBehavior::Succeed { after_polls } if polls >= after_polls => {
                        job.status = JobStatus::Completed;
                        (JobProgress::new(JobStatus::Completed), Some(job.spec.clone()))
                    }
                    JobBehavior::Fail { after_polls, reason } if polls >= after_polls => {
                        job.status = JobStatus::Failed;
                        (JobProgress::failed(reason), None)
                    }
                    _ => {
                        job.status = JobStatus::InProgress;
                        (JobProgress::new(JobStatus::InProgress), None)
                    }
                }
            }
        };

        if let Some(spec) = completed_spec {
            self.materialize(&spec).await?;
        }
        Ok(progress)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<()> {
        if let Some(mut job) = self.jobs.get_mut(&handle.id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Stopping;
            }
        }
        self.cancelled.write().push(handle.job_name.clone());
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::core::TerminalStatus;
    use crate::jobs::{OutputMount, ResourceConfig, UploadMode};
    use crate::storage::InMemoryArtifactStore;

    fn processing_spec(name: &str) -> JobSpec {
        JobSpec::new(
            name,
            JobKind::Processing,
            "img",
            "role",
            ResourceConfig {
                instance_count: 2,
                instance_type: "ml.m5.4xlarge".to_string(),
                volume_size_in_gb: 30,
            },
        )
        .with_output(OutputMount {
            name: "n2.default".to_string(),
            source: Some("/opt/ml/processing/output".to_string()),
            destination_uri: "s3://bucket/prefix".to_string(),
            upload_mode: UploadMode::EndOfJob,
        })
    }

    #[tokio::test]
    async fn test_processing_outputs_land_under_job_name() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let runner = InMemoryJobRunner::new()
            .with_store(store.clone())
            .with_output_parts(3);

        let submission = runner
            .submit(&processing_spec("job-a"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(submission.outcome.unwrap().is_success());
        let keys = store.list("bucket", "prefix/job-a/").await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.ends_with(".csv")));
    }

    #[tokio::test]
    async fn test_rejected_job() {
        let runner = InMemoryJobRunner::new().with_behavior(
            JobKind::Processing,
            JobBehavior::Reject {
                reason: "ResourceLimitExceeded".to_string(),
            },
        );

        let err = runner.start(&processing_spec("job-a")).await.unwrap_err();
        assert_eq!(err.code(), "JOB-SUBMISSION");
        assert!(runner.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_job_name_rejected() {
        let runner = InMemoryJobRunner::new();
        runner.start(&processing_spec("job-a")).await.unwrap();

        assert!(runner.start(&processing_spec("job-a")).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_after_polls() {
        let runner = InMemoryJobRunner::new().with_behavior(
            JobKind::Processing,
            JobBehavior::Fail {
                after_polls: 2,
                reason: "ClientError: flow file invalid".to_string(),
            },
        );

        let outcome = runner
            .submit(&processing_spec("job-b"), &CancellationToken::new())
            .await
            .unwrap()
            .outcome
            .unwrap();

        assert_eq!(outcome.status, TerminalStatus::Failed);
        assert_eq!(outcome.polls, 2);
    }

    #[tokio::test]
    async fn test_cancel_moves_job_to_stopped() {
        let runner = InMemoryJobRunner::new().with_behavior(JobKind::Processing, JobBehavior::Hang);
        let handle = runner.start(&processing_spec("job-c")).await.unwrap();

        assert_eq!(runner.status(&handle).await.unwrap().status, JobStatus::InProgress);
        runner.cancel(&handle).await.unwrap();

        assert_eq!(runner.status(&handle).await.unwrap().status, JobStatus::Stopped);
        assert_eq!(runner.cancelled_jobs(), vec!["job-c".to_string()]);
    }
}
