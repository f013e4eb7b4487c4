use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_config, NodeHandler, NodeRecorder};
use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::evaluator::evaluate_condition;
use crate::result::NodeExecutionResult;
use crate::types::{GraphNode, HANDLE_FALSE, HANDLE_TRUE};

/// Configuration for a condition node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default)]
    pub condition: String,
}

/// Evaluates the node's expression and reports the branch to follow
#[derive(Debug, Default)]
pub struct ConditionHandler;

impl ConditionHandler {
    fn run(
        &self,
        node: &GraphNode,
        context: &ExecutionContext,
        recorder: &mut NodeRecorder,
    ) -> Result<Value> {
        let config: ConditionConfig = parse_config(node)?;
        let expression = config.condition.trim();
        if expression.is_empty() {
            return Err(FlowError::invalid_config(&node.id, "condition is required"));
        }

        recorder.log(format!("Evaluating condition: {}", expression));
        let outcome = evaluate_condition(expression, context)?;
        let path = if outcome { HANDLE_TRUE } else { HANDLE_FALSE };
        recorder.log(format!("Condition result: {}", outcome));

        Ok(json!({
            "conditionResult": outcome,
            "conditionExpression": expression,
            "result": outcome,
            "path": path,
        }))
    }
}

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(node);
        let outcome = self.run(node, context, &mut recorder);
        recorder.finish(outcome)
    }
}
