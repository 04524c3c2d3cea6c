//! Pipeline coordination.
//!
//! This module provides:
//! - The run state machine
//! - [`PipelineCoordinator`], which runs the stages in order
//! - Run results and failures for the scheduler

mod coordinator;
mod result;
mod state;

pub use coordinator::PipelineCoordinator;
pub use result::{PipelineRun, RunFailure};
pub use state::{PipelineState, StateChange, StateMachine};

pub use crate::stages::Stage;
