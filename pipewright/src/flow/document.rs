//! Flow-graph document schema.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a flow-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Reads a dataset.
    Source,
    /// Transforms its inputs.
    Transform,
    /// Exposes a named output port.
    Output,
    /// Any node type this core does not interpret.
    #[serde(other)]
    Other,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "SOURCE"),
            Self::Transform => write!(f, "TRANSFORM"),
            Self::Output => write!(f, "OUTPUT"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// A named output port of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    /// The port name.
    pub name: String,
}

/// One node of the flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    /// The node id.
    pub node_id: String,
    /// The node kind.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Kind-specific parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Output ports, in declaration order.
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
}

/// A stored flow-graph document: `{ "nodes": [...] }`.
///
/// Nodes are kept in document order; the last node is the terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    /// The graph nodes.
    pub nodes: Vec<FlowNode>,
}

impl FlowDocument {
    /// Parses a document from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `MalformedGraph` if the bytes are not a JSON document of the
    /// expected shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| PipelineError::malformed_graph(e.to_string()))
    }

    /// Parses a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `MalformedGraph` if the value is not of the expected shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| PipelineError::malformed_graph(e.to_string()))
    }

    /// Returns the terminal node, if any.
    #[must_use]
    pub fn terminal_node(&self) -> Option<&FlowNode> {
        self.nodes.last()
    }

    /// Iterates over `SOURCE` nodes in document order.
    pub fn source_nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(|node| node.node_type == NodeType::Source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_node_types_are_tolerated() {
        let doc = FlowDocument::from_value(serde_json::json!({
            "metadata": {"version": 1},
            "nodes": [
                {"node_id": "a", "type": "VISUALIZATION", "extra": true},
                {"node_id": "b", "type": "OUTPUT", "outputs": [{"name": "default"}]}
            ]
        }))
        .unwrap();

        assert_eq!(doc.nodes[0].node_type, NodeType::Other);
        assert_eq!(doc.terminal_node().unwrap().node_id, "b");
        assert_eq!(doc.source_nodes().count(), 0);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = FlowDocument::from_slice(b"{\"nodes\": ").unwrap_err();
        assert_eq!(err.code(), "FLOW-MALFORMED");

        let err = FlowDocument::from_slice(b"{\"edges\": []}").unwrap_err();
        assert_eq!(err.code(), "FLOW-MALFORMED");
    }
}
