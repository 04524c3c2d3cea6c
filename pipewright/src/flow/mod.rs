//! Declarative flow-graph documents.
//!
//! The transform stage reads a stored flow graph to learn which datasets the
//! job must mount and under which composite name the job's single output is
//! published.

mod document;
mod parser;

pub use document::{FlowDocument, FlowNode, NodeType, OutputPort};
pub use parser::{parse_flow, parse_flow_bytes, FlowSource, ParsedFlow};
