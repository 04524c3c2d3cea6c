//! Sequential execution of the four pipeline stages.

use super::{PipelineRun, PipelineState, RunFailure, StateChange, StateMachine};
use crate::config::PipelineParams;
use crate::context::RunContext;
use crate::core::StageKind;
use crate::errors::{PipelineError, Result};
use crate::events::{names, EventSink, NoOpEventSink};
use crate::jobs::{JobRunner, ModelRegistry};
use crate::observability::{run_span, stage_span};
use crate::stages::{ConfigureStage, RegisterStage, Stage, TrainStage, TransformOutcome, TransformStage};
use crate::storage::ArtifactStore;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Tracing target for coordination.
pub const TRACING_TARGET: &str = "pipewright::pipeline";

/// Runs configure, transform, train and register in order.
///
/// Each stage's output is recorded in the [`RunContext`] before the next
/// stage starts. The first error moves the run to `Failed` and is returned
/// as a [`RunFailure`]; nothing is retried at this layer.
pub struct PipelineCoordinator {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl PipelineCoordinator {
    /// Creates a coordinator wired to the given backends.
    #[must_use]
    pub fn new(
        params: PipelineParams,
        store: Arc<dyn ArtifactStore>,
        runner: Arc<dyn JobRunner>,
        registry: Arc<dyn ModelRegistry>,
    ) -> Self {
        let name = params.pipeline_name.clone();
        Self {
            name,
            stages: vec![
                Arc::new(ConfigureStage::new(params)),
                Arc::new(TransformStage::new(Arc::clone(&store), Arc::clone(&runner))),
                Arc::new(TrainStage::new(store, runner)),
                Arc::new(RegisterStage::new(registry)),
            ],
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a coordinator from custom stage implementations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless every stage kind is present exactly once.
    pub fn from_stages(name: impl Into<String>, mut stages: Vec<Arc<dyn Stage>>) -> Result<Self> {
        stages.sort_by_key(|stage| stage.kind());
        let kinds: Vec<StageKind> = stages.iter().map(|stage| stage.kind()).collect();
        if kinds != StageKind::ALL {
            return Err(PipelineError::invalid_config(
                "stages",
                format!("expected one stage of each kind {:?}, got {kinds:?}", StageKind::ALL),
            ));
        }

        Ok(Self {
            name: name.into(),
            stages,
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage of a given kind.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&Arc<dyn Stage>> {
        self.stages.iter().find(|stage| stage.kind() == kind)
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] naming the failing stage.
    pub async fn run(&self, ctx: &RunContext) -> std::result::Result<PipelineRun, RunFailure> {
        self.run_stages(ctx)
            .instrument(run_span(&self.name, ctx.run_id()))
            .await
    }

    /// Executes one stage and records its output, for schedulers that
    /// invoke stages as separate tasks.
    ///
    /// A cancelled run submits nothing. Failures are reported the same way
    /// as in [`run`](Self::run); the returned history is empty because no
    /// run-level state machine is kept across separate invocations.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] naming `kind`, including `OutputConflict` if
    /// the stage already ran.
    pub async fn run_stage(
        &self,
        kind: StageKind,
        ctx: &RunContext,
    ) -> std::result::Result<serde_json::Value, RunFailure> {
        let result = match self.stage(kind) {
            Some(stage) => match ensure_not_cancelled(ctx) {
                Ok(()) => self.execute_and_record(stage.as_ref(), ctx).await,
                Err(error) => Err(error),
            },
            None => Err(PipelineError::invalid_config("stages", format!("no '{kind}' stage"))),
        };

        match result {
            Ok(value) => Ok(value),
            Err(error) => Err(self.report_failure(ctx, kind, error, Vec::new()).await),
        }
    }

    async fn run_stages(&self, ctx: &RunContext) -> std::result::Result<PipelineRun, RunFailure> {
        let started = Instant::now();
        let mut machine = StateMachine::new();

        tracing::info!(target: TRACING_TARGET, "Pipeline run started");
        self.events
            .emit(names::PIPELINE_STARTED, Some(json!({"run_id": ctx.run_id(), "pipeline": self.name})))
            .await;

        for stage in &self.stages {
            let kind = stage.kind();
            if let Err(error) = self.advance_stage(stage.as_ref(), ctx, &mut machine).await {
                return Err(self.fail(ctx, kind, error, &mut machine).await);
            }
        }

        if let Err(error) = machine.advance(PipelineState::Done) {
            return Err(self.fail(ctx, StageKind::Register, error, &mut machine).await);
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(target: TRACING_TARGET, duration_ms, "Pipeline run completed");
        self.events
            .emit(
                names::PIPELINE_COMPLETED,
                Some(json!({"run_id": ctx.run_id(), "duration_ms": duration_ms})),
            )
            .await;

        Ok(PipelineRun {
            run_id: ctx.run_id().to_string(),
            pipeline: self.name.clone(),
            history: machine.history().to_vec(),
            outputs: ctx.outputs().to_dict(),
            duration_ms,
        })
    }

    async fn advance_stage(&self, stage: &dyn Stage, ctx: &RunContext, machine: &mut StateMachine) -> Result<()> {
        let kind = stage.kind();
        ensure_not_cancelled(ctx)?;

        if let Some(state) = PipelineState::on_dispatch(kind) {
            machine.advance(state)?;
        }

        self.execute_and_record(stage, ctx).await?;
        machine.advance(PipelineState::on_complete(kind))?;
        Ok(())
    }

    async fn execute_and_record(&self, stage: &dyn Stage, ctx: &RunContext) -> Result<serde_json::Value> {
        let kind = stage.kind();
        tracing::info!(target: TRACING_TARGET, stage = %kind, "Stage started");
        self.events
            .emit(names::STAGE_STARTED, Some(json!({"run_id": ctx.run_id(), "stage": kind.as_str()})))
            .await;

        let value = stage
            .execute(ctx)
            .instrument(stage_span(ctx.run_id(), stage.name()))
            .await?;
        ctx.record_value(kind, value.clone())?;

        if let (StageKind::Transform, Ok(outcome)) =
            (kind, serde_json::from_value::<TransformOutcome>(value.clone()))
        {
            self.events
                .emit(
                    names::ARTIFACT_RELOCATED,
                    Some(json!({
                        "run_id": ctx.run_id(),
                        "job_name": outcome.job.job_name,
                        "location": outcome.training_data.uri,
                        "objects": outcome.relocated.len(),
                    })),
                )
                .await;
        }

        tracing::info!(target: TRACING_TARGET, stage = %kind, "Stage completed");
        self.events
            .emit(names::STAGE_COMPLETED, Some(json!({"run_id": ctx.run_id(), "stage": kind.as_str()})))
            .await;
        Ok(value)
    }

    async fn fail(
        &self,
        ctx: &RunContext,
        stage: StageKind,
        error: PipelineError,
        machine: &mut StateMachine,
    ) -> RunFailure {
        if let Err(e) = machine.advance(PipelineState::Failed) {
            tracing::warn!(target: TRACING_TARGET, error = %e, "Run already terminal");
        }
        self.report_failure(ctx, stage, error, machine.history().to_vec()).await
    }

    async fn report_failure(
        &self,
        ctx: &RunContext,
        stage: StageKind,
        error: PipelineError,
        history: Vec<StateChange>,
    ) -> RunFailure {
        tracing::error!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            stage = %stage,
            code = error.code(),
            error = %error,
            "Pipeline run failed"
        );
        let details = error.to_dict();
        self.events
            .emit(
                names::STAGE_FAILED,
                Some(json!({"run_id": ctx.run_id(), "stage": stage.as_str(), "error": details})),
            )
            .await;
        self.events
            .emit(
                names::PIPELINE_FAILED,
                Some(json!({"run_id": ctx.run_id(), "stage": stage.as_str(), "code": error.code()})),
            )
            .await;

        RunFailure {
            run_id: ctx.run_id().to_string(),
            pipeline: self.name.clone(),
            stage,
            job_handle: error.job_handle().map(str::to_string),
            error,
            history,
        }
    }
}

/// Fails with `Cancelled` once the scheduler has cancelled the run.
fn ensure_not_cancelled(ctx: &RunContext) -> Result<()> {
    if ctx.is_cancelled() {
        let reason = ctx.cancellation().reason().unwrap_or_default();
        return Err(PipelineError::cancelled(reason));
    }
    Ok(())
}
