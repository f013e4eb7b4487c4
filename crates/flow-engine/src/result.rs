//! Per-node and per-run execution results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;
use crate::types::{NodeId, NodeKind};

/// Status of one node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

/// Failure detail attached to an `error` node result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeError {
    /// Human-readable message
    pub message: String,
    /// Technical cause, where one is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Short machine-readable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&FlowError> for NodeError {
    fn from(err: &FlowError) -> Self {
        Self {
            message: err.to_string(),
            cause: err.cause(),
            code: Some(err.code()),
        }
    }
}

/// Outcome of executing a single node. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionResult {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub status: NodeStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
}

impl NodeExecutionResult {
    /// Result for a node that failed before any handler ran
    pub fn failed(node_id: impl Into<String>, node_kind: NodeKind, error: NodeError) -> Self {
        let now = Utc::now();
        Self {
            node_id: node_id.into(),
            node_kind,
            status: NodeStatus::Error,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            output: None,
            logs: vec![error.message.clone()],
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == NodeStatus::Error
    }

    /// Branch selected by a condition node. Always `None` for other kinds.
    pub fn branch_path(&self) -> Option<&str> {
        if self.node_kind != NodeKind::Condition {
            return None;
        }
        self.output
            .as_ref()
            .and_then(|o| o.get("path"))
            .and_then(|p| p.as_str())
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// Node counts for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_nodes: usize,
    pub success_nodes: usize,
    pub error_nodes: usize,
    /// Nodes in the graph that never produced a result
    pub skipped_nodes: usize,
}

impl RunStats {
    /// Tally results against the size of the graph
    pub fn compute(total_nodes: usize, results: &[NodeExecutionResult]) -> Self {
        Self {
            total_nodes,
            success_nodes: results.iter().filter(|r| r.is_success()).count(),
            error_nodes: results.iter().filter(|r| r.is_error()).count(),
            skipped_nodes: total_nodes.saturating_sub(results.len()),
        }
    }
}

/// Aggregated result of one graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    /// Node results in execution order
    pub node_results: Vec<NodeExecutionResult>,
    /// Output of the most recently completed sink node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    pub stats: RunStats,
    /// Variable namespace as left by the last writer for each name
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Run-level failure (configuration errors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Result recorded for a node, if it ran
    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }

    /// IDs of executed nodes in execution order
    pub fn executed_ids(&self) -> Vec<&str> {
        self.node_results.iter().map(|r| r.node_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = NodeExecutionResult::failed(
            "n1",
            NodeKind::RemoteCall,
            NodeError::new("boom").with_code("X"),
        );
        assert!(result.is_error());
        assert_eq!(result.duration_ms, 0);
        assert_eq!(result.error.as_ref().and_then(|e| e.code.as_deref()), Some("X"));
        assert!(result.branch_path().is_none());
    }

    #[test]
    fn test_branch_path_only_for_conditions() {
        let mut result = NodeExecutionResult::failed("h", NodeKind::RemoteCall, NodeError::new(""));
        result.status = NodeStatus::Success;
        result.output = Some(serde_json::json!({"path": "/api/users"}));
        assert!(result.branch_path().is_none());

        result.node_kind = NodeKind::Condition;
        result.output = Some(serde_json::json!({"path": "true"}));
        assert_eq!(result.branch_path(), Some("true"));
    }

    #[test]
    fn test_stats() {
        let ok = |id: &str| {
            let mut r = NodeExecutionResult::failed(id, NodeKind::Trigger, NodeError::new(""));
            r.status = NodeStatus::Success;
            r
        };
        let results = vec![
            ok("a"),
            ok("b"),
            NodeExecutionResult::failed("c", NodeKind::RemoteCall, NodeError::new("x")),
        ];
        let stats = RunStats::compute(5, &results);
        assert_eq!(
            stats,
            RunStats {
                total_nodes: 5,
                success_nodes: 2,
                error_nodes: 1,
                skipped_nodes: 2,
            }
        );
    }

    #[test]
    fn test_node_error_from_flow_error() {
        let err = FlowError::MissingCredential("openai".to_string());
        let node_error = NodeError::from(&err);
        assert_eq!(node_error.message, "API key for openai not configured");
        assert_eq!(node_error.code.as_deref(), Some("MISSING_CREDENTIAL"));
    }

    #[test]
    fn test_serialization_shape() {
        let result = NodeExecutionResult::failed("n", NodeKind::Sink, NodeError::new("bad"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["nodeId"], "n");
        assert_eq!(json["nodeKind"], "output");
        assert_eq!(json["status"], "error");
        assert!(json.get("output").is_none());
    }
}
