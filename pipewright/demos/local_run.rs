//! Runs the whole pipeline against a local directory.
//!
//! ```bash
//! RUST_LOG=pipewright=debug cargo run --example local_run -- /tmp/pipewright
//! ```

use anyhow::Context;
use pipewright::observability::init_tracing;
use pipewright::prelude::*;
use pipewright::testing::{seed_flow, SAMPLE_ROLE};
use std::sync::Arc;
use std::time::Duration;

const FLOW_URI: &str = "file://lake/flows/claims.flow";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(std::env::var("LOG_JSON").is_ok()).map_err(|e| anyhow::anyhow!(e))?;

    let root = std::env::args()
        .nth(1)
        .map_or_else(|| std::env::temp_dir().join("pipewright"), Into::into);
    let store = Arc::new(LocalArtifactStore::new(&root));
    seed_flow(store.as_ref(), FLOW_URI).await;

    let runner = Arc::new(
        InMemoryJobRunner::new()
            .with_store(store.clone())
            .with_output_parts(3)
            .with_poll_interval(Duration::from_millis(50)),
    );
    let registry = Arc::new(InMemoryModelRegistry::new().with_store(store.clone()));

    let params = PipelineParams::new(SAMPLE_ROLE, "lake", FLOW_URI)
        .with_storage_scheme("file")
        .with_training_override("check_interval_seconds", serde_json::json!(1));

    let coordinator = PipelineCoordinator::new(params, store, runner, registry)
        .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let ctx = RunContext::new("ml-pipeline");
    let run = coordinator.run(&ctx).await.context("pipeline run failed")?;

    println!("{}", serde_json::to_string_pretty(&run.to_dict())?);
    println!("artifacts under {}", root.display());
    Ok(())
}
