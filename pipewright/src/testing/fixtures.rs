//! Test fixtures for pipeline testing.

use crate::config::PipelineParams;
use crate::storage::ArtifactStore;
use serde_json::{json, Value};

/// Execution role used by [`sample_params`].
pub const SAMPLE_ROLE: &str = "arn:aws:iam::111122223333:role/pipeline-execution";

/// Builds a `SOURCE` node reading `uri` as dataset `name`.
#[must_use]
pub fn source_node(node_id: &str, name: &str, uri: &str) -> Value {
    json!({
        "node_id": node_id,
        "type": "SOURCE",
        "parameters": {
            "dataset_definition": {
                "name": name,
                "s3ExecutionContext": {"s3Uri": uri}
            }
        },
        "outputs": [{"name": "default"}]
    })
}

/// Builds a flow document with the given `(node_id, name, uri)` sources
/// followed by a terminal `OUTPUT` node exposing `port`.
#[must_use]
pub fn flow_document(sources: &[(&str, &str, &str)], (output_id, port): (&str, &str)) -> Value {
    let mut nodes: Vec<Value> = sources
        .iter()
        .map(|(node_id, name, uri)| source_node(node_id, name, uri))
        .collect();
    nodes.push(json!({
        "node_id": output_id,
        "type": "OUTPUT",
        "outputs": [{"name": port}]
    }));
    json!({ "nodes": nodes })
}

/// A two-source claims/customers flow with output `join.default`.
#[must_use]
pub fn sample_flow() -> Value {
    flow_document(
        &[
            ("claims-src", "claims", "s3://raw-data/claims.csv"),
            ("customers-src", "customers", "s3://raw-data/customers.csv"),
        ],
        ("join", "default"),
    )
}

/// Pipeline parameters for bucket `bucket` reading the flow at `flow_uri`.
#[must_use]
pub fn sample_params(flow_uri: &str) -> PipelineParams {
    PipelineParams::new(SAMPLE_ROLE, "bucket", flow_uri)
}

/// Stores [`sample_flow`] at `uri`.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub async fn seed_flow(store: &dyn ArtifactStore, uri: &str) {
    seed_flow_document(store, uri, &sample_flow()).await;
}

/// Stores `document` at `uri`.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub async fn seed_flow_document(store: &dyn ArtifactStore, uri: &str, document: &Value) {
    let bytes = serde_json::to_vec(document).expect("flow fixture serializes");
    store.put(uri, bytes).await.expect("flow fixture is stored");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{parse_flow, FlowDocument};
    use crate::storage::InMemoryArtifactStore;

    #[test]
    fn test_sample_flow_parses() {
        let parsed = parse_flow(&FlowDocument::from_value(sample_flow()).unwrap()).unwrap();

        assert_eq!(parsed.output_name, "join.default");
        assert_eq!(parsed.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_seed_flow() {
        let store = InMemoryArtifactStore::new();
        seed_flow(&store, "s3://bucket/flows/a.flow").await;

        assert!(store.contains("s3://bucket/flows/a.flow"));
    }
}
