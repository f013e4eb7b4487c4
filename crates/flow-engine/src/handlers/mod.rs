//! Node handlers
//!
//! One handler per [`NodeKind`]. A handler never fails past its own
//! boundary: it returns a [`NodeExecutionResult`] whose status is `error`
//! when something went wrong, with the message, cause, and the log lines
//! collected up to that point.
//!
//! Each built-in handler does its work in a private `run` method that uses
//! `?` freely, and [`NodeRecorder::finish`] turns the `Result` into the
//! recorded outcome.

pub mod condition;
pub mod model_call;
pub mod remote_call;
pub mod sink;
pub mod trigger;

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::result::{NodeError, NodeExecutionResult, NodeStatus};
use crate::types::{GraphNode, NodeKind};

pub use condition::{ConditionConfig, ConditionHandler};
pub use model_call::{ModelCallHandler, ModelConfig, ModelProvider};
pub use remote_call::{HttpMethod, RemoteCallConfig, RemoteCallHandler};
pub use sink::{OutputType, SinkConfig, SinkHandler};
pub use trigger::{TriggerConfig, TriggerHandler, TriggerType};

/// Executable behavior for one node kind
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Execute a node. Failures are reported through the result status.
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult;
}

/// Collects timing and log lines for one node execution
pub struct NodeRecorder {
    node_id: String,
    node_kind: NodeKind,
    start_time: DateTime<Utc>,
    started: Instant,
    logs: Vec<String>,
}

impl NodeRecorder {
    /// Start timing a node
    pub fn start(node: &GraphNode) -> Self {
        Self {
            node_id: node.id.clone(),
            node_kind: node.kind,
            start_time: Utc::now(),
            started: Instant::now(),
            logs: Vec::new(),
        }
    }

    /// Append a log line
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("[{}] {}", self.node_id, line);
        self.logs.push(line);
    }

    /// Finish timing and build the recorded result
    pub fn finish(mut self, outcome: Result<Value>) -> NodeExecutionResult {
        let (status, output, error) = match outcome {
            Ok(output) => (NodeStatus::Success, Some(output), None),
            Err(err) => {
                self.logs.push(format!("Error: {}", err));
                (NodeStatus::Error, None, Some(NodeError::from(&err)))
            }
        };
        NodeExecutionResult {
            node_id: self.node_id,
            node_kind: self.node_kind,
            status,
            start_time: self.start_time,
            end_time: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            output,
            logs: self.logs,
            error,
        }
    }
}

/// Deserialize a node's config payload into its typed form
pub fn parse_config<T: DeserializeOwned>(node: &GraphNode) -> Result<T> {
    let data = if node.data.is_null() {
        Value::Object(Default::default())
    } else {
        node.data.clone()
    };
    serde_json::from_value(data).map_err(|e| FlowError::invalid_config(&node.id, e.to_string()))
}
