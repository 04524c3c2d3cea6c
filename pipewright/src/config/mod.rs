//! Stage configuration.
//!
//! Operators supply [`PipelineParams`]; per run, the configure stage layers
//! their overrides over documented defaults with [`build`] and produces a
//! [`PipelineConfigBundle`] of typed stage configurations.

mod builder;
mod bundle;
mod params;
mod training;
mod transform;

pub use builder::{build, config_map, require, ConfigMap, StageConfigBuilder};
pub use bundle::PipelineConfigBundle;
pub use params::PipelineParams;
pub use training::{
    xgboost_image_uri, AlgorithmConfig, ChannelConfig, ModelConfig, TrainingConfig, TrainingDefaults,
};
pub use transform::{
    TransformConfig, TransformDefaults, TransformOutputConfig, DEFAULT_CONTAINER_URI, OUTPUT_SECTION,
    PINNED_CONTAINER_URI,
};
