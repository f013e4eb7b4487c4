//! Fluent builder for flow graphs
//!
//! Provides a fluent API for constructing graph snapshots programmatically.

use serde_json::{json, Value};

use crate::handlers::HttpMethod;
use crate::types::{FlowGraph, GraphEdge, GraphNode, NodeKind};

/// Fluent builder for constructing flow graphs
///
/// # Example
///
/// ```ignore
/// let graph = GraphBuilder::new("flow-1", "Check status")
///     .trigger("start")
///     .http("fetch", HttpMethod::Get, "https://api.example.com/status")
///     .condition("ok", "status === 'ok'")
///     .output("done")
///     .connect("start", "fetch")
///     .connect("fetch", "ok")
///     .connect_branch("ok", "true", "done")
///     .build();
/// ```
pub struct GraphBuilder {
    id: String,
    name: String,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    edge_counter: usize,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counter: 0,
        }
    }

    /// Add a node with an arbitrary config payload
    pub fn node(mut self, id: impl Into<String>, kind: NodeKind, data: Value) -> Self {
        self.nodes.push(GraphNode::with_data(id, kind, data));
        self
    }

    /// Add a manual trigger
    pub fn trigger(self, id: impl Into<String>) -> Self {
        self.node(id, NodeKind::Trigger, json!({ "triggerType": "manual" }))
    }

    /// Add a remote call without headers or body
    pub fn http(self, id: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        self.node(id, NodeKind::RemoteCall, json!({ "method": method, "url": url }))
    }

    /// Add an OpenAI model call
    pub fn llm(self, id: impl Into<String>, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        let (model, prompt) = (model.into(), prompt.into());
        self.node(
            id,
            NodeKind::ModelCall,
            json!({ "provider": "openai", "model": model, "prompt": prompt }),
        )
    }

    /// Add a condition node
    pub fn condition(self, id: impl Into<String>, expression: impl Into<String>) -> Self {
        let expression = expression.into();
        self.node(id, NodeKind::Condition, json!({ "condition": expression }))
    }

    /// Add a JSON sink
    pub fn output(self, id: impl Into<String>) -> Self {
        self.node(id, NodeKind::Sink, json!({ "outputType": "json" }))
    }

    /// Connect two nodes (auto-generates edge ID)
    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let id = self.next_edge_id();
        self.edges.push(GraphEdge::new(id, source, target));
        self
    }

    /// Connect a condition branch to a target (auto-generates edge ID)
    pub fn connect_branch(
        mut self,
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let id = self.next_edge_id();
        self.edges.push(GraphEdge::branch(id, source, handle, target));
        self
    }

    fn next_edge_id(&mut self) -> String {
        self.edge_counter += 1;
        format!("edge-{}", self.edge_counter)
    }

    /// Build the graph without validation
    pub fn build(self) -> FlowGraph {
        let mut graph = FlowGraph::new(self.id, self.name);
        graph.nodes = self.nodes;
        graph.edges = self.edges;
        graph
    }
}
