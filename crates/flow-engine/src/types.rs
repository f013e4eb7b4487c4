//! Graph snapshot types
//!
//! A `FlowGraph` is the read-only input to a run: a list of typed nodes and
//! the directed edges between them. The engine never mutates it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Handle tag for the branch taken when a condition holds
pub const HANDLE_TRUE: &str = "true";

/// Handle tag for the branch taken when a condition does not hold
pub const HANDLE_FALSE: &str = "false";

/// The kind of a node. Closed set; every kind has exactly one built-in handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Run entry point
    #[serde(rename = "trigger")]
    Trigger,
    /// HTTP-style request
    #[serde(rename = "http")]
    RemoteCall,
    /// Language model invocation
    #[serde(rename = "llm")]
    ModelCall,
    /// Boolean branch
    #[serde(rename = "condition")]
    Condition,
    /// Final reporting step
    #[serde(rename = "output")]
    Sink,
}

impl NodeKind {
    /// Every node kind, in palette order
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Trigger,
        NodeKind::RemoteCall,
        NodeKind::ModelCall,
        NodeKind::Condition,
        NodeKind::Sink,
    ];

    /// Wire name of this kind (matches the serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::RemoteCall => "http",
            NodeKind::ModelCall => "llm",
            NodeKind::Condition => "condition",
            NodeKind::Sink => "output",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "Trigger",
            NodeKind::RemoteCall => "HTTP Request",
            NodeKind::ModelCall => "LLM",
            NodeKind::Condition => "Condition",
            NodeKind::Sink => "Output",
        }
    }

    /// Whether a run may start at a node of this kind
    pub fn is_entry(&self) -> bool {
        matches!(self, NodeKind::Trigger)
    }

    /// Branch handles this kind can emit on its outgoing edges
    pub fn output_handles(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Condition => &[HANDLE_TRUE, HANDLE_FALSE],
            _ => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| FlowError::config(format!("Unknown node kind '{}'", s)))
    }
}

/// A node in the graph snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// The kind of step this node performs
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Kind-specific configuration
    #[serde(default)]
    pub data: serde_json::Value,
}

impl GraphNode {
    /// Create a node without configuration
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: serde_json::Value::Null,
        }
    }

    /// Create a node with configuration
    pub fn with_data(id: impl Into<String>, kind: NodeKind, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            data,
        }
    }

    /// Display label from the config, falling back to the node id
    pub fn label(&self) -> &str {
        self.data
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }
}

/// A directed edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Branch tag, only meaningful on edges leaving a condition node
    #[serde(default, rename = "sourceHandle", alias = "handle")]
    pub handle: Option<String>,
}

impl GraphEdge {
    /// Create an untagged edge
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            handle: None,
        }
    }

    /// Create an edge tagged with a branch handle
    pub fn branch(
        id: impl Into<String>,
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            handle: Some(handle.into()),
        }
    }
}

/// A graph snapshot: nodes plus directed edges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    /// Identifier of the flow, if the editor assigned one
    #[serde(default)]
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Nodes in declaration order
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Edges in declaration order
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl FlowGraph {
    /// Create an empty graph
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Parse a graph snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a graph snapshot from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Find a node by its ID
    pub fn find_node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// First node in declaration order whose kind can start a run
    pub fn entry_node(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.kind.is_entry())
    }

    /// Edges leaving a node, in declaration order
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    /// Edges entering a node, in declaration order
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }

    /// First edge from `source` to `target`, if any
    pub fn edge_between(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_wire_names() {
        for kind in NodeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert!("webhook".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_parse_snapshot() {
        let graph = FlowGraph::from_json(
            r#"{
                "nodes": [
                    {"id": "t", "type": "trigger", "data": {"triggerType": "manual"}},
                    {"id": "c", "type": "condition", "data": {"condition": "true"}},
                    {"id": "o", "type": "output"}
                ],
                "edges": [
                    {"id": "e1", "source": "t", "target": "c"},
                    {"id": "e2", "source": "c", "target": "o", "sourceHandle": "true"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[1].kind, NodeKind::Condition);
        assert!(graph.nodes[2].data.is_null());
        assert_eq!(graph.edges[0].handle, None);
        assert_eq!(graph.edges[1].handle.as_deref(), Some("true"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = FlowGraph::from_json(r#"{"nodes": [{"id": "x", "type": "database"}]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_entry_node_is_first_trigger() {
        let mut graph = FlowGraph::new("g", "G");
        graph.nodes.push(GraphNode::new("out", NodeKind::Sink));
        graph.nodes.push(GraphNode::new("t1", NodeKind::Trigger));
        graph.nodes.push(GraphNode::new("t2", NodeKind::Trigger));

        assert_eq!(graph.entry_node().map(|n| n.id.as_str()), Some("t1"));
    }

    #[test]
    fn test_edge_queries() {
        let mut graph = FlowGraph::new("g", "G");
        graph.edges.push(GraphEdge::new("e1", "a", "b"));
        graph.edges.push(GraphEdge::new("e2", "a", "c"));
        graph.edges.push(GraphEdge::new("e3", "b", "c"));

        let out: Vec<_> = graph.outgoing_edges("a").iter().map(|e| e.id.clone()).collect();
        assert_eq!(out, vec!["e1", "e2"]);
        assert_eq!(graph.incoming_edges("c").len(), 2);
        assert_eq!(graph.edge_between("b", "c").map(|e| e.id.as_str()), Some("e3"));
        assert!(graph.edge_between("c", "a").is_none());
    }

    #[test]
    fn test_label_fallback() {
        let node = GraphNode::with_data("n1", NodeKind::Sink, serde_json::json!({"label": "Result"}));
        assert_eq!(node.label(), "Result");
        assert_eq!(GraphNode::new("n2", NodeKind::Sink).label(), "n2");
    }
}
