//! Trigger handler: the run entry point

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_config, NodeHandler, NodeRecorder};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::result::NodeExecutionResult;
use crate::types::GraphNode;

/// How a flow is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    #[default]
    Manual,
    Webhook,
    Schedule,
}

/// Extra settings for webhook and schedule triggers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSettings {
    pub webhook_url: Option<String>,
    /// Cron expression
    pub schedule: Option<String>,
}

/// Configuration for a trigger node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub config: Option<TriggerSettings>,
}

/// Emits the activation time and trigger type
#[derive(Debug, Default)]
pub struct TriggerHandler;

impl TriggerHandler {
    fn run(&self, node: &GraphNode, recorder: &mut NodeRecorder) -> Result<Value> {
        let config: TriggerConfig = parse_config(node)?;
        let trigger_type = serde_json::to_value(config.trigger_type)?;
        recorder.log(format!(
            "Trigger activated: {}",
            trigger_type.as_str().unwrap_or("manual")
        ));
        Ok(json!({
            "triggeredAt": Utc::now().to_rfc3339(),
            "triggerType": trigger_type,
        }))
    }
}

#[async_trait]
impl NodeHandler for TriggerHandler {
    async fn execute(&self, node: &GraphNode, _context: &ExecutionContext) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(node);
        let outcome = self.run(node, &mut recorder);
        recorder.finish(outcome)
    }
}
