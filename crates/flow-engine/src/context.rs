//! Run-scoped state: the variable namespace and recorded node results.
//!
//! Each call to the executor builds a fresh `ExecutionContext`; nothing here
//! is shared between runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::RunConfig;
use crate::evaluator::{extract_variables, ExpressionScope};
use crate::result::NodeExecutionResult;
use crate::types::NodeId;

/// Flat name -> value namespace populated by completed nodes.
///
/// Writes only add or overwrite; the last writer for a name wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    variables: Map<String, Value>,
}

impl VariableContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Check if a variable exists
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Shallow-flatten a node output into the namespace
    pub fn merge_output(&mut self, output: &Value) {
        for (name, value) in extract_variables(output) {
            self.variables.insert(name, value);
        }
    }

    /// Consume the context, returning the variables
    pub fn into_map(self) -> Map<String, Value> {
        self.variables
    }
}

impl From<Map<String, Value>> for VariableContext {
    fn from(variables: Map<String, Value>) -> Self {
        Self { variables }
    }
}

impl ExpressionScope for VariableContext {
    fn variable(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn node_output(&self, _node_id: &str) -> Option<&Value> {
        None
    }

    fn has_node_result(&self, _node_id: &str) -> bool {
        false
    }
}

/// Everything a handler may read while executing one node
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: String,
    config: Arc<RunConfig>,
    variables: VariableContext,
    results: Vec<NodeExecutionResult>,
    index: HashMap<NodeId, usize>,
}

impl ExecutionContext {
    /// Create the context for a new run
    pub fn new(run_id: impl Into<String>, config: Arc<RunConfig>) -> Self {
        Self {
            run_id: run_id.into(),
            config,
            variables: VariableContext::new(),
            results: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn variables(&self) -> &VariableContext {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableContext {
        &mut self.variables
    }

    /// Record a node result. Successful outputs are merged into the variables.
    pub fn record(&mut self, result: NodeExecutionResult) {
        if self.index.contains_key(&result.node_id) {
            log::warn!("Node '{}' recorded twice; keeping the first result", result.node_id);
            return;
        }
        if result.is_success() {
            if let Some(output) = &result.output {
                self.variables.merge_output(output);
            }
        }
        self.index.insert(result.node_id.clone(), self.results.len());
        self.results.push(result);
    }

    /// Result recorded for a node
    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.index.get(node_id).map(|&i| &self.results[i])
    }

    /// Results recorded so far, in execution order
    pub fn results(&self) -> &[NodeExecutionResult] {
        &self.results
    }

    /// Consume the context, returning results and variables
    pub fn into_parts(self) -> (Vec<NodeExecutionResult>, VariableContext) {
        (self.results, self.variables)
    }
}

impl ExpressionScope for ExecutionContext {
    fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.node_result(node_id).and_then(|r| r.output.as_ref())
    }

    fn has_node_result(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }
}
