//! Flow Engine - execution core for visually composed flows
//!
//! This crate runs a graph snapshot of typed steps (triggers, remote calls,
//! model calls, conditions, sinks) and reports what happened. It supports:
//!
//! - Depth-first execution from the trigger with at-most-once visitation
//! - Variable propagation between steps with `{{name}}` templates
//! - Conditional branching through a sandboxed expression language
//! - Progress and highlight events for any observer
//! - A timed highlight simulator with pause and reset
//!
//! # Architecture
//!
//! - `GraphExecutor`: traversal, dispatch, result aggregation
//! - `HandlerRegistry`: node kind -> `NodeHandler`
//! - `evaluator`: condition expressions and template interpolation
//! - `HighlightSimulator`: ordering and timed visual feedback only
//! - `EventSink`: fire-and-forget observer seam
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{GraphBuilder, GraphExecutor, NullEventSink, RunConfig};
//!
//! let graph = GraphBuilder::new("flow-1", "Hello")
//!     .trigger("start")
//!     .llm("greet", "gpt-4o-mini", "Say hello")
//!     .output("done")
//!     .connect("start", "greet")
//!     .connect("greet", "done")
//!     .build();
//!
//! let executor = GraphExecutor::with_builtins(RunConfig::default())?;
//! let result = executor.execute(&graph, &NullEventSink).await;
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod executor;
pub mod handlers;
pub mod registry;
pub mod result;
pub mod simulator;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::GraphBuilder;
pub use config::{ExecutionMode, RunConfig, SimulationConfig};
pub use context::{ExecutionContext, VariableContext};
pub use error::{FlowError, Result};
pub use evaluator::{evaluate_condition, extract_variables, interpolate_variables};
pub use events::{
    ChannelEventSink, EventError, EventSink, FlowEvent, HighlightStatus, NullEventSink, VecEventSink,
};
pub use executor::GraphExecutor;
pub use handlers::NodeHandler;
pub use registry::HandlerRegistry;
pub use result::{NodeError, NodeExecutionResult, NodeStatus, RunResult, RunStats, RunStatus};
pub use simulator::{HighlightSimulator, SimulationHandle, SimulationResult, SimulationStatus};
pub use types::{FlowGraph, GraphEdge, GraphNode, NodeKind};
pub use validation::{validate_graph, ValidationError};
