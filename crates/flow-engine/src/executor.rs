//! Graph executor
//!
//! Runs a flow graph from its trigger node. Nodes execute one at a time in
//! depth-first order: each node's successors are visited in edge declaration
//! order before the next sibling. A node runs at most once per run, so
//! diamonds and cycles terminate.
//!
//! After a node succeeds its output is merged into the run's variables. A
//! failed node prunes its subtree. After a condition node only edges whose
//! handle equals the chosen `path` are followed; every other kind follows all
//! of its outgoing edges.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::events::{emit, EventSink, FlowEvent, HighlightStatus};
use crate::registry::HandlerRegistry;
use crate::result::{NodeError, NodeExecutionResult, RunResult, RunStats, RunStatus};
use crate::types::{FlowGraph, GraphEdge, GraphNode, NodeId, NodeKind};
use crate::validation::validate_edge_references;

/// Error code for nodes whose kind has no registered handler
pub const UNREGISTERED_KIND_CODE: &str = "UNREGISTERED_KIND";

/// Executes flow graphs against a handler registry
pub struct GraphExecutor {
    registry: HandlerRegistry,
    config: Arc<RunConfig>,
}

impl GraphExecutor {
    /// Create an executor with a custom registry
    pub fn new(registry: HandlerRegistry, config: RunConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }

    /// Create an executor with the built-in handlers
    pub fn with_builtins(config: RunConfig) -> Result<Self> {
        let registry = HandlerRegistry::with_builtins(&config)?;
        Ok(Self::new(registry, config))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run a graph to completion.
    ///
    /// Never fails: configuration problems are reported through the
    /// returned result's `error` field with `status = error`.
    pub async fn execute(&self, graph: &FlowGraph, event_sink: &dyn EventSink) -> RunResult {
        let run = RunTimer::start();
        let mut context = ExecutionContext::new(run.run_id.clone(), Arc::clone(&self.config));

        log::info!(
            "Starting run {} for graph '{}' ({} nodes, {} edges)",
            run.run_id,
            graph.id,
            graph.nodes.len(),
            graph.edges.len()
        );
        emit(
            event_sink,
            FlowEvent::RunStarted {
                run_id: run.run_id.clone(),
                graph_id: graph.id.clone(),
            },
        );

        if let Err(e) = preflight(graph) {
            return run.finish(graph, context, Some(e.to_string()), event_sink);
        }
        let Some(entry) = graph.entry_node() else {
            return run.finish(graph, context, Some("No trigger node found".to_string()), event_sink);
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        // Each entry carries the edge it was reached through
        let mut stack: Vec<(NodeId, Option<&GraphEdge>)> = vec![(entry.id.clone(), None)];

        while let Some((node_id, via)) = stack.pop() {
            if visited.contains(&node_id) {
                continue;
            }
            let Some(node) = graph.find_node(&node_id) else {
                log::warn!("Node '{}' not found in graph, skipping", node_id);
                continue;
            };
            visited.insert(node_id.clone());
            if let Some(edge) = via {
                emit(event_sink, FlowEvent::edge(&edge.id, true));
            }

            let result = self.run_node(node, &context, event_sink).await;
            let next = if result.is_success() {
                successors(graph, &node_id, result.branch_path())
            } else {
                Vec::new()
            };
            context.record(result);

            // Reverse so the first declared edge is visited first
            for edge in next.into_iter().rev() {
                stack.push((edge.target.clone(), Some(edge)));
            }
        }

        run.finish(graph, context, None, event_sink)
    }

    async fn run_node(
        &self,
        node: &GraphNode,
        context: &ExecutionContext,
        event_sink: &dyn EventSink,
    ) -> NodeExecutionResult {
        let (node_id, kind) = (node.id.as_str(), node.kind);
        let run_id = context.run_id().to_string();
        emit(
            event_sink,
            FlowEvent::NodeStarted {
                run_id: run_id.clone(),
                node_id: node_id.to_string(),
            },
        );
        emit(event_sink, FlowEvent::highlight(node_id, Some(HighlightStatus::Executing)));

        let result = match self.registry.resolve(kind) {
            Some(handler) => {
                log::debug!("Executing node '{}' [{}] ({})", node.label(), node_id, kind);
                handler.execute(node, context).await
            }
            None => {
                log::warn!("No handler registered for node kind '{}'", kind);
                NodeExecutionResult::failed(
                    node_id,
                    kind,
                    NodeError::new(format!("No handler registered for node kind '{}'", kind))
                        .with_code(UNREGISTERED_KIND_CODE),
                )
            }
        };

        match &result.error {
            None => {
                emit(
                    event_sink,
                    FlowEvent::NodeCompleted {
                        run_id,
                        node_id: node_id.to_string(),
                        duration_ms: result.duration_ms,
                    },
                );
                emit(event_sink, FlowEvent::highlight(node_id, Some(HighlightStatus::Success)));
            }
            Some(error) => {
                log::warn!("Node '{}' failed: {}", node_id, error.message);
                emit(
                    event_sink,
                    FlowEvent::NodeFailed {
                        run_id,
                        node_id: node_id.to_string(),
                        error: error.message.clone(),
                    },
                );
                emit(event_sink, FlowEvent::highlight(node_id, Some(HighlightStatus::Error)));
            }
        }

        result
    }
}

/// Every edge endpoint must name an existing node
fn preflight(graph: &FlowGraph) -> Result<()> {
    let problems = validate_edge_references(graph);
    if problems.is_empty() {
        return Ok(());
    }
    let message = problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(FlowError::config(message))
}

/// Outgoing edges to follow after a node succeeded
fn successors<'g>(graph: &'g FlowGraph, node_id: &str, path: Option<&str>) -> Vec<&'g GraphEdge> {
    let edges = graph.outgoing_edges(node_id);
    match path {
        Some(path) => edges
            .into_iter()
            .filter(|e| e.handle.as_deref() == Some(path))
            .collect(),
        None => edges,
    }
}

/// Output of the most recently executed successful sink
fn final_output(results: &[NodeExecutionResult]) -> Option<Value> {
    results
        .iter()
        .rev()
        .find(|r| r.node_kind == NodeKind::Sink && r.is_success())
        .and_then(|r| r.output.clone())
}

struct RunTimer {
    run_id: String,
    start_time: chrono::DateTime<Utc>,
    started: Instant,
}

impl RunTimer {
    fn start() -> Self {
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    fn finish(
        self,
        graph: &FlowGraph,
        context: ExecutionContext,
        error: Option<String>,
        event_sink: &dyn EventSink,
    ) -> RunResult {
        let (node_results, variables) = context.into_parts();
        let stats = RunStats::compute(graph.nodes.len(), &node_results);
        let status = if error.is_none() && stats.error_nodes == 0 {
            RunStatus::Success
        } else {
            RunStatus::Error
        };
        let duration_ms = self.started.elapsed().as_millis() as u64;

        match (&status, &error) {
            (RunStatus::Success, _) => {
                log::info!(
                    "Run {} completed: {} nodes succeeded in {}ms",
                    self.run_id,
                    stats.success_nodes,
                    duration_ms
                );
                emit(
                    event_sink,
                    FlowEvent::RunCompleted {
                        run_id: self.run_id.clone(),
                        duration_ms,
                    },
                );
            }
            (RunStatus::Error, Some(message)) => {
                log::error!("Run {} failed: {}", self.run_id, message);
                emit(
                    event_sink,
                    FlowEvent::RunFailed {
                        run_id: self.run_id.clone(),
                        error: message.clone(),
                    },
                );
            }
            (RunStatus::Error, None) => {
                let message = format!("{} node(s) failed", stats.error_nodes);
                log::warn!("Run {} finished with errors: {}", self.run_id, message);
                emit(
                    event_sink,
                    FlowEvent::RunFailed {
                        run_id: self.run_id.clone(),
                        error: message,
                    },
                );
            }
        }

        RunResult {
            run_id: self.run_id,
            status,
            start_time: self.start_time,
            end_time: Utc::now(),
            duration_ms,
            final_output: final_output(&node_results),
            node_results,
            stats,
            variables: variables.into_map(),
            error,
        }
    }
}
