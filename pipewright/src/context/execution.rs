//! The per-run execution context.

use super::{ContextSnapshot, OutputBag, RunToken};
use crate::cancellation::CancellationToken;
use crate::core::StageKind;
use crate::errors::{PipelineError, Result};
use crate::jobs::job_name;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// State shared by every stage of one pipeline run.
///
/// Holds the run token, the outputs each stage recorded, the job-name
/// sequence counter and the cancellation token the scheduler can trip.
#[derive(Debug)]
pub struct RunContext {
    token: RunToken,
    pipeline_name: String,
    outputs: OutputBag,
    job_sequence: AtomicU32,
    cancellation: Arc<CancellationToken>,
    started_at: DateTime<Utc>,
}

impl RunContext {
    /// Creates a context for a new run with a freshly generated token.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self::with_token(pipeline_name, RunToken::generate())
    }

    /// Creates a context for a run with a known token.
    #[must_use]
    pub fn with_token(pipeline_name: impl Into<String>, token: RunToken) -> Self {
        Self {
            token,
            pipeline_name: pipeline_name.into(),
            outputs: OutputBag::new(),
            job_sequence: AtomicU32::new(0),
            cancellation: Arc::new(CancellationToken::new()),
            started_at: Utc::now(),
        }
    }

    /// Rebuilds a context from a snapshot handed back by the scheduler.
    #[must_use]
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        Self {
            token: snapshot.token,
            pipeline_name: snapshot.pipeline_name,
            outputs: OutputBag::from_entries(snapshot.stage_outputs),
            job_sequence: AtomicU32::new(snapshot.job_sequence),
            cancellation: Arc::new(CancellationToken::new()),
            started_at: snapshot.started_at,
        }
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Arc<CancellationToken>) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns the run token.
    #[must_use]
    pub fn token(&self) -> &RunToken {
        &self.token
    }

    /// Returns the run id (the token text).
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.token.as_str()
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Derives the next job name for this run: `"{prefix}-{token}-{seq}"`.
    ///
    /// The sequence starts at 1 and never repeats within a run.
    pub fn next_job_name(&self, prefix: &str) -> String {
        let seq = self.job_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        job_name(prefix, &self.token, seq)
    }

    /// Records the output of a stage.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the output cannot be encoded and
    /// `OutputConflict` if the stage already recorded an output.
    pub fn record<T: Serialize>(&self, stage: StageKind, output: &T) -> Result<()> {
        let value = serde_json::to_value(output)?;
        self.outputs.set(stage.as_str(), value)?;
        Ok(())
    }

    /// Records a stage output that is already a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflict` if the stage already recorded an output.
    pub fn record_value(&self, stage: StageKind, value: serde_json::Value) -> Result<()> {
        self.outputs.set(stage.as_str(), value)?;
        Ok(())
    }

    /// Returns the raw output recorded by a stage.
    #[must_use]
    pub fn output(&self, stage: StageKind) -> Option<serde_json::Value> {
        self.outputs.get(stage.as_str())
    }

    /// Returns whether a stage has recorded its output.
    #[must_use]
    pub fn has_output(&self, stage: StageKind) -> bool {
        self.outputs.contains(stage.as_str())
    }

    /// Decodes the output recorded by a stage.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if the stage has not recorded an output and
    /// `Serialization` if the output does not decode as `T`.
    pub fn output_as<T: DeserializeOwned>(&self, stage: StageKind) -> Result<T> {
        let value = self
            .output(stage)
            .ok_or_else(|| PipelineError::missing_key(format!("stage_outputs.{stage}")))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the stage output bag.
    #[must_use]
    pub fn outputs(&self) -> &OutputBag {
        &self.outputs
    }

    /// Returns the shared cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancellation)
    }

    /// Requests cancellation of the run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancellation.cancel(reason);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Takes a serializable snapshot of the context.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            token: self.token.clone(),
            pipeline_name: self.pipeline_name.clone(),
            job_sequence: self.job_sequence.load(Ordering::SeqCst),
            stage_outputs: self.outputs.entries(),
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> RunContext {
        RunContext::with_token("ml-pipeline", RunToken::from_existing("07-04-05-09-a1b2c3d4"))
    }

    #[test]
    fn test_job_names_are_sequenced() {
        let ctx = ctx();

        assert_eq!(
            ctx.next_job_name("data-wrangler-flow-processing"),
            "data-wrangler-flow-processing-07-04-05-09-a1b2c3d4-1"
        );
        assert_eq!(ctx.next_job_name("XGBoost-training"), "XGBoost-training-07-04-05-09-a1b2c3d4-2");
    }

    #[test]
    fn test_distinct_tokens_give_distinct_job_names() {
        let a = RunContext::with_token("p", RunToken::from_existing("07-04-05-09-aaaaaaaa"));
        let b = RunContext::with_token("p", RunToken::from_existing("07-04-05-09-bbbbbbbb"));

        assert_ne!(a.next_job_name("job"), b.next_job_name("job"));
    }

    #[test]
    fn test_record_once() {
        let ctx = ctx();
        ctx.record(StageKind::Transform, &serde_json::json!({"job": "x"})).unwrap();

        let err = ctx
            .record(StageKind::Transform, &serde_json::json!({"job": "y"}))
            .unwrap_err();
        assert_eq!(err.code(), "CONTEXT-CONFLICT");
    }

    #[test]
    fn test_output_as_missing_stage() {
        let ctx = ctx();
        let err = ctx.output_as::<serde_json::Value>(StageKind::Train).unwrap_err();

        assert_eq!(err.code(), "CONFIG-MISSING-KEY");
        assert!(err.to_string().contains("stage_outputs.train"));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_sequence() {
        let ctx = ctx();
        ctx.next_job_name("a");
        ctx.record(StageKind::Configure, &serde_json::json!({"run_id": ctx.run_id()}))
            .unwrap();

        let value = ctx.snapshot().to_value().unwrap();
        let restored = RunContext::from_snapshot(ContextSnapshot::from_value(value).unwrap());

        assert_eq!(restored.run_id(), ctx.run_id());
        assert!(restored.has_output(StageKind::Configure));
        assert_eq!(restored.next_job_name("b"), "b-07-04-05-09-a1b2c3d4-2");
        assert_eq!(restored.snapshot().completed_stages(), vec!["start"]);
    }

    #[test]
    fn test_cancel_is_shared() {
        let token = Arc::new(CancellationToken::new());
        let ctx = ctx().with_cancellation(Arc::clone(&token));

        ctx.cancel("scheduler shutdown");

        assert!(token.is_cancelled());
        assert!(ctx.is_cancelled());
    }
}
