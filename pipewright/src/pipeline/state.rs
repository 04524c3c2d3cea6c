//! The pipeline run state machine.

use crate::core::StageKind;
use crate::errors::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a pipeline run is.
///
/// ```text
/// Init -> ConfigBuilt -> TransformSubmitted -> TransformDone
///      -> TrainSubmitted -> TrainDone -> ModelRegistered -> Done
/// ```
///
/// Any non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has run yet.
    Init,
    /// The configuration bundle is recorded.
    ConfigBuilt,
    /// The transform stage has been dispatched.
    TransformSubmitted,
    /// Transform output is relocated and recorded.
    TransformDone,
    /// The train stage has been dispatched.
    TrainSubmitted,
    /// The model artifact is recorded.
    TrainDone,
    /// The model is published.
    ModelRegistered,
    /// The run completed.
    Done,
    /// The run failed.
    Failed,
}

impl PipelineState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (current, Self::Failed) => !current.is_terminal(),
            (Self::Init, Self::ConfigBuilt)
            | (Self::ConfigBuilt, Self::TransformSubmitted)
            | (Self::TransformSubmitted, Self::TransformDone)
            | (Self::TransformDone, Self::TrainSubmitted)
            | (Self::TrainSubmitted, Self::TrainDone)
            | (Self::TrainDone, Self::ModelRegistered)
            | (Self::ModelRegistered, Self::Done) => true,
            _ => false,
        }
    }

    /// The state entered when a stage is dispatched, if it has one.
    #[must_use]
    pub fn on_dispatch(kind: StageKind) -> Option<Self> {
        match kind {
            StageKind::Transform => Some(Self::TransformSubmitted),
            StageKind::Train => Some(Self::TrainSubmitted),
            StageKind::Configure | StageKind::Register => None,
        }
    }

    /// The state entered when a stage's output is recorded.
    #[must_use]
    pub fn on_complete(kind: StageKind) -> Self {
        match kind {
            StageKind::Configure => Self::ConfigBuilt,
            StageKind::Transform => Self::TransformDone,
            StageKind::Train => Self::TrainDone,
            StageKind::Register => Self::ModelRegistered,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::ConfigBuilt => write!(f, "config_built"),
            Self::TransformSubmitted => write!(f, "transform_submitted"),
            Self::TransformDone => write!(f, "transform_done"),
            Self::TrainSubmitted => write!(f, "train_submitted"),
            Self::TrainDone => write!(f, "train_done"),
            Self::ModelRegistered => write!(f, "model_registered"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One entry of a run's state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// The state entered.
    pub state: PipelineState,
    /// When it was entered.
    pub at: DateTime<Utc>,
}

/// Tracks the current state and rejects illegal transitions.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<StateChange>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            current: PipelineState::Init,
            history: vec![StateChange {
                state: PipelineState::Init,
                at: Utc::now(),
            }],
        }
    }
}

impl StateMachine {
    /// Creates a machine in `Init`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Returns every state entered so far.
    #[must_use]
    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the move is not allowed.
    pub fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        self.current = next;
        self.history.push(StateChange {
            state: next,
            at: Utc::now(),
        });
        Ok(())
    }
}
