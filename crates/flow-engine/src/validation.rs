//! Graph validation for flow snapshots
//!
//! Validates edge references, entry presence, branch handles, and detects
//! cycles. The executor runs [`validate_edge_references`] as its pre-flight
//! check; the full [`validate_graph`] is for editors and the CLI.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{FlowGraph, NodeKind};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cycle detected in the graph. Runs still terminate, so this is a warning.
    CycleDetected,
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// No trigger node to start a run from
    MissingTrigger,
    /// An edge leaving a condition node carries no recognised branch handle
    InvalidHandle {
        edge_id: String,
        handle: Option<String>,
    },
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
}

impl ValidationError {
    /// Whether the problem still allows a run to proceed
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::CycleDetected)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in graph"),
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::MissingTrigger => write!(f, "No trigger node found"),
            Self::InvalidHandle {
                edge_id,
                handle: Some(handle),
            } => {
                write!(f, "Edge '{}' uses unknown branch handle '{}'", edge_id, handle)
            }
            Self::InvalidHandle {
                edge_id,
                handle: None,
            } => {
                write!(f, "Edge '{}' leaves a condition without a branch handle", edge_id)
            }
            Self::DuplicateNodeId { node_id } => {
                write!(f, "Node id '{}' is used more than once", node_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a flow graph
///
/// Returns all validation errors found (not just the first).
pub fn validate_graph(graph: &FlowGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_ids(graph, &mut errors);
    errors.extend(validate_edge_references(graph));
    if graph.entry_node().is_none() {
        errors.push(ValidationError::MissingTrigger);
    }
    validate_branch_handles(graph, &mut errors);
    detect_cycles(graph, &mut errors);

    errors
}

/// Check that all edge source/target nodes exist
pub fn validate_edge_references(graph: &FlowGraph) -> Vec<ValidationError> {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut errors = Vec::new();

    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if !node_ids.contains(edge.target.as_str()) {
            errors.push(ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            });
        }
    }

    errors
}

fn validate_unique_ids(graph: &FlowGraph, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Edges leaving a condition must be tagged with one of its handles
fn validate_branch_handles(graph: &FlowGraph, errors: &mut Vec<ValidationError>) {
    for edge in &graph.edges {
        let Some(source) = graph.find_node(&edge.source) else {
            continue;
        };
        if source.kind != NodeKind::Condition {
            continue;
        }
        let handles = source.kind.output_handles();
        let valid = edge
            .handle
            .as_deref()
            .is_some_and(|h| handles.contains(&h));
        if !valid {
            errors.push(ValidationError::InvalidHandle {
                edge_id: edge.id.clone(),
                handle: edge.handle.clone(),
            });
        }
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(graph: &FlowGraph, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        in_degree.insert(&node.id, 0);
    }
    for edge in &graph.edges {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for edge in graph.edges.iter().filter(|e| e.source == node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}
