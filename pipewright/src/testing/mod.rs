//! Testing utilities for pipewright pipelines.
//!
//! This module provides:
//! - Flow-graph document fixtures
//! - Sample pipeline parameters
//! - Assertions over run contexts, failures and emitted events

mod assertions;
mod fixtures;

pub use assertions::{assert_event_order, assert_failed_at, assert_stage_recorded};
pub use fixtures::{
    flow_document, sample_flow, sample_params, seed_flow, seed_flow_document, source_node,
    SAMPLE_ROLE,
};
