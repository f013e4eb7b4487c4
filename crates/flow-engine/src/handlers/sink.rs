use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{parse_config, NodeHandler, NodeRecorder};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::result::NodeExecutionResult;
use crate::types::GraphNode;

/// Sink destination format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Json,
    Text,
    Webhook,
}

/// Configuration for a sink node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    #[serde(default)]
    pub output_type: OutputType,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Collects the outputs of every node executed so far
#[derive(Debug, Default)]
pub struct SinkHandler;

impl SinkHandler {
    fn run(
        &self,
        node: &GraphNode,
        context: &ExecutionContext,
        recorder: &mut NodeRecorder,
    ) -> Result<Value> {
        let config: SinkConfig = parse_config(node)?;

        let data: Map<String, Value> = context
            .results()
            .iter()
            .filter_map(|r| r.output.as_ref().map(|o| (r.node_id.clone(), o.clone())))
            .collect();
        recorder.log(format!("Collected outputs from {} nodes", data.len()));

        if config.output_type == OutputType::Webhook {
            match config.destination.as_deref() {
                Some(url) if !url.is_empty() => recorder.log(format!("Would send to webhook: {}", url)),
                _ => recorder.log("Webhook sink has no destination"),
            }
        }

        Ok(json!({
            "outputType": config.output_type,
            "destination": config.destination,
            "data": data,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

#[async_trait]
impl NodeHandler for SinkHandler {
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(node);
        let outcome = self.run(node, context, &mut recorder);
        recorder.finish(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::result::{NodeError, NodeStatus};
    use crate::types::NodeKind;
    use std::sync::Arc;

    fn recorded(id: &str, kind: NodeKind, output: Value) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(&GraphNode::new(id, kind));
        recorder.log("done");
        recorder.finish(Ok(output))
    }

    #[tokio::test]
    async fn test_snapshots_prior_outputs() {
        let mut ctx = ExecutionContext::new("run", Arc::new(RunConfig::default()));
        ctx.record(recorded("t", NodeKind::Trigger, json!({"triggerType": "manual"})));
        ctx.record(recorded("h", NodeKind::RemoteCall, json!("plain text")));
        ctx.record(NodeExecutionResult::failed("x", NodeKind::RemoteCall, NodeError::new("boom")));

        let node = GraphNode::with_data("out", NodeKind::Sink, json!({"outputType": "text"}));
        let result = SinkHandler.execute(&node, &ctx).await;

        assert_eq!(result.status, NodeStatus::Success);
        let output = result.output.unwrap();
        assert_eq!(output["outputType"], "text");
        assert_eq!(output["destination"], Value::Null);
        assert_eq!(output["data"]["t"]["triggerType"], "manual");
        assert_eq!(output["data"]["h"], "plain text");
        assert!(output["data"].get("x").is_none());
    }

    #[tokio::test]
    async fn test_webhook_only_logs_destination() {
        let ctx = ExecutionContext::new("run", Arc::new(RunConfig::default()));
        let node = GraphNode::with_data(
            "out",
            NodeKind::Sink,
            json!({"outputType": "webhook", "destination": "https://hooks.example.com/x"}),
        );
        let result = SinkHandler.execute(&node, &ctx).await;

        assert!(result
            .logs
            .iter()
            .any(|l| l == "Would send to webhook: https://hooks.example.com/x"));
        assert_eq!(result.output.unwrap()["destination"], "https://hooks.example.com/x");
    }
}
