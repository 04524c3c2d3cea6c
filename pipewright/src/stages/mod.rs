//! The four pipeline stages.
//!
//! Each stage reads what earlier stages recorded in the [`RunContext`],
//! does its work and returns a JSON value that the coordinator (or an
//! external scheduler) records under the stage's name.

mod configure;
mod register;
mod train;
mod transform;

pub use configure::ConfigureStage;
pub use register::{RegisterOutcome, RegisterStage};
pub use train::{training_job_spec, TrainOutcome, TrainStage};
pub use transform::{transform_job_spec, TransformOutcome, TransformStage};

use crate::context::RunContext;
use crate::core::StageKind;
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Tracing target for stage execution.
pub const TRACING_TARGET: &str = "pipewright::stages";

/// One step of the pipeline, invocable on its own by a scheduler.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// The name the stage's output is recorded under.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The run context holding earlier stages' outputs
    ///
    /// # Returns
    ///
    /// The value to record under [`name`](Self::name).
    async fn execute(&self, ctx: &RunContext) -> Result<serde_json::Value>;
}
