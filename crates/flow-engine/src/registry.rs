//! Handler registry for node kind dispatch
//!
//! Maps each [`NodeKind`] to the [`NodeHandler`] that executes it. The
//! built-in set is produced by an exhaustive match over the kind enum, so a
//! new kind cannot be added without deciding how it runs. Hosts and tests can
//! replace individual handlers or remove them; an unregistered kind resolves
//! to `None` and the executor records that node as failed.
//!
//! # Usage
//!
//! ```ignore
//! use flow_engine::{HandlerRegistry, RunConfig};
//!
//! let mut registry = HandlerRegistry::with_builtins(&RunConfig::default())?;
//! registry.register_callback(NodeKind::RemoteCall, |_node, _ctx| Ok(json!({"stub": true})));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::handlers::{
    ConditionHandler, ModelCallHandler, NodeHandler, NodeRecorder, RemoteCallHandler, SinkHandler,
    TriggerHandler,
};
use crate::result::NodeExecutionResult;
use crate::types::{GraphNode, NodeKind};

/// Registry of node kinds and their handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with a handler for every built-in kind.
    ///
    /// Network handlers share one HTTP client using the run's node timeout.
    pub fn with_builtins(config: &RunConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.node_timeout())
            .build()?;

        let mut registry = Self::new();
        for kind in NodeKind::ALL {
            registry.register(kind, builtin_handler(kind, &client));
        }
        Ok(registry)
    }

    /// Register (or replace) the handler for a kind
    pub fn register(&mut self, kind: NodeKind, handler: Arc<dyn NodeHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            log::debug!("Replaced handler for node kind '{}'", kind);
        }
    }

    /// Register a synchronous closure as the handler for a kind
    pub fn register_callback<F>(&mut self, kind: NodeKind, callback: F)
    where
        F: Fn(&GraphNode, &ExecutionContext) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(CallbackHandler::new(callback)));
    }

    /// Remove the handler for a kind
    pub fn unregister(&mut self, kind: NodeKind) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.remove(&kind)
    }

    /// Look up the handler for a kind
    pub fn resolve(&self, kind: NodeKind) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Kinds with a registered handler, in declaration order
    pub fn kinds(&self) -> Vec<NodeKind> {
        NodeKind::ALL
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn builtin_handler(kind: NodeKind, client: &reqwest::Client) -> Arc<dyn NodeHandler> {
    match kind {
        NodeKind::Trigger => Arc::new(TriggerHandler),
        NodeKind::RemoteCall => Arc::new(RemoteCallHandler::with_client(client.clone())),
        NodeKind::ModelCall => Arc::new(ModelCallHandler::with_client(client.clone())),
        NodeKind::Condition => Arc::new(ConditionHandler),
        NodeKind::Sink => Arc::new(SinkHandler),
    }
}

/// Handler that wraps a synchronous closure
///
/// The closure's `Err` becomes an `error` result, the same as a built-in.
pub struct CallbackHandler {
    callback: Box<dyn Fn(&GraphNode, &ExecutionContext) -> Result<Value> + Send + Sync>,
}

impl CallbackHandler {
    pub fn new(
        callback: impl Fn(&GraphNode, &ExecutionContext) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeHandler for CallbackHandler {
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult {
        let recorder = NodeRecorder::start(node);
        recorder.finish((self.callback)(node, context))
    }
}
