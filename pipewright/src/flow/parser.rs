//! Extraction of job inputs and the output descriptor from a flow graph.

use super::{FlowDocument, FlowNode};
use crate::errors::{PipelineError, Result};
use crate::storage::StorageUri;
use serde::{Deserialize, Serialize};

const SOURCE_NAME_POINTER: &str = "/dataset_definition/name";
const SOURCE_URI_POINTER: &str = "/dataset_definition/s3ExecutionContext/s3Uri";

/// A dataset read by the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSource {
    /// The dataset name, used as the job input name.
    pub name: String,
    /// The dataset URI.
    pub uri: String,
}

/// What the transform job needs to know about a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFlow {
    /// `"{node_id}.{port_name}"` of the terminal node's first output port.
    ///
    /// The job container looks its output up by this composite key, so the
    /// format must not change.
    pub output_name: String,
    /// Source datasets in document order.
    pub sources: Vec<FlowSource>,
}

/// Parses a flow graph into its output name and ordered sources.
///
/// # Errors
///
/// Returns `MalformedGraph` if there are no nodes, the terminal node has no
/// output port, or a `SOURCE` node has no name or no resolvable URI.
pub fn parse_flow(document: &FlowDocument) -> Result<ParsedFlow> {
    let terminal = document
        .terminal_node()
        .ok_or_else(|| PipelineError::malformed_graph("flow graph has no nodes"))?;

    let port = terminal.outputs.first().ok_or_else(|| {
        PipelineError::malformed_graph(format!(
            "terminal node '{}' declares no output port",
            terminal.node_id
        ))
    })?;

    let sources = document
        .source_nodes()
        .map(source_of)
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedFlow {
        output_name: format!("{}.{}", terminal.node_id, port.name),
        sources,
    })
}

/// Reads and parses a flow graph from raw document bytes.
///
/// # Errors
///
/// See [`FlowDocument::from_slice`] and [`parse_flow`].
pub fn parse_flow_bytes(bytes: &[u8]) -> Result<ParsedFlow> {
    parse_flow(&FlowDocument::from_slice(bytes)?)
}

fn source_of(node: &FlowNode) -> Result<FlowSource> {
    let name = node
        .parameters
        .pointer(SOURCE_NAME_POINTER)
        .and_then(serde_json::Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            PipelineError::malformed_graph(format!("source node '{}' has no dataset name", node.node_id))
        })?;

    let uri = node
        .parameters
        .pointer(SOURCE_URI_POINTER)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            PipelineError::malformed_graph(format!("source node '{}' has no input uri", node.node_id))
        })?;

    StorageUri::parse(uri).map_err(|e| {
        PipelineError::malformed_graph(format!("source node '{}': {e}", node.node_id))
    })?;

    Ok(FlowSource {
        name: name.to_string(),
        uri: uri.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flow_document, source_node};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_source_scenario() {
        let doc = FlowDocument::from_value(serde_json::json!({
            "nodes": [
                {
                    "node_id": "n1",
                    "type": "SOURCE",
                    "parameters": {
                        "dataset_definition": {
                            "name": "n1-name",
                            "s3ExecutionContext": {"s3Uri": "s3://b/in.csv"}
                        }
                    },
                    "outputs": [{"name": "default"}]
                },
                {"node_id": "n2", "type": "OUTPUT", "outputs": [{"name": "default"}]}
            ]
        }))
        .unwrap();

        let parsed = parse_flow(&doc).unwrap();

        assert_eq!(parsed.output_name, "n2.default");
        assert_eq!(
            parsed.sources,
            vec![FlowSource {
                name: "n1-name".to_string(),
                uri: "s3://b/in.csv".to_string(),
            }]
        );
    }

    #[test]
    fn test_sources_keep_document_order() {
        let doc = flow_document(
            &[("c", "claims", "s3://b/claims.csv"), ("a", "customers", "s3://b/customers.csv")],
            ("join", "default"),
        );

        let parsed = parse_flow(&FlowDocument::from_value(doc).unwrap()).unwrap();

        let names: Vec<_> = parsed.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["claims", "customers"]);
        assert_eq!(parsed.output_name, "join.default");
    }

    #[test]
    fn test_uses_first_output_port() {
        let doc = serde_json::json!({
            "nodes": [
                source_node("s", "data", "s3://b/d.csv"),
                {"node_id": "t", "type": "TRANSFORM", "outputs": [{"name": "primary"}, {"name": "secondary"}]}
            ]
        });

        let parsed = parse_flow(&FlowDocument::from_value(doc).unwrap()).unwrap();
        assert_eq!(parsed.output_name, "t.primary");
    }

    #[test]
    fn test_empty_nodes() {
        let doc = FlowDocument { nodes: Vec::new() };
        assert_eq!(parse_flow(&doc).unwrap_err().code(), "FLOW-MALFORMED");
    }

    #[test]
    fn test_terminal_without_port() {
        let doc = serde_json::json!({
            "nodes": [
                source_node("s", "data", "s3://b/d.csv"),
                {"node_id": "out", "type": "OUTPUT"}
            ]
        });

        let err = parse_flow(&FlowDocument::from_value(doc).unwrap()).unwrap_err();
        assert!(err.to_string().contains("'out' declares no output port"));
    }

    #[test]
    fn test_source_without_uri() {
        let doc = serde_json::json!({
            "nodes": [
                {"node_id": "s", "type": "SOURCE", "parameters": {"dataset_definition": {"name": "x"}}},
                {"node_id": "out", "type": "OUTPUT", "outputs": [{"name": "default"}]}
            ]
        });

        let err = parse_flow(&FlowDocument::from_value(doc).unwrap()).unwrap_err();
        assert!(err.to_string().contains("no input uri"));
    }

    #[test]
    fn test_source_with_unresolvable_uri() {
        let doc = flow_document(&[("s", "data", "not-a-uri")], ("out", "default"));
        assert!(parse_flow(&FlowDocument::from_value(doc).unwrap()).is_err());
    }

    #[test]
    fn test_parse_flow_bytes() {
        let doc = flow_document(&[("s", "data", "s3://b/d.csv")], ("out", "default"));
        let bytes = serde_json::to_vec(&doc).unwrap();

        let parsed = parse_flow_bytes(&bytes).unwrap();
        assert_eq!(parsed.sources.len(), 1);
    }
}
