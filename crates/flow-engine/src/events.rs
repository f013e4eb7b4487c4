//! Event types for observing runs and simulations
//!
//! Events are fire-and-forget: the executor and simulator report progress to
//! an [`EventSink`] and ignore send failures, so a closed observer never
//! affects a run.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Trait for receiving flow events
///
/// Abstracts over the transport (UI bridge, channel, log) so the engine can
/// be embedded in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: FlowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Visual state of a highlighted node. `None` on the event clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStatus {
    Executing,
    Success,
    Error,
}

/// Events emitted during a run or a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowEvent {
    /// Run started
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String, graph_id: String },

    /// Run finished with no node errors
    #[serde(rename_all = "camelCase")]
    RunCompleted { run_id: String, duration_ms: u64 },

    /// Run finished with a node error or a configuration error
    #[serde(rename_all = "camelCase")]
    RunFailed { run_id: String, error: String },

    /// A node started executing
    #[serde(rename_all = "camelCase")]
    NodeStarted { run_id: String, node_id: String },

    /// A node completed successfully
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        run_id: String,
        node_id: String,
        duration_ms: u64,
    },

    /// A node failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        run_id: String,
        node_id: String,
        error: String,
    },

    /// Canvas highlight for a node
    #[serde(rename_all = "camelCase")]
    NodeHighlight {
        node_id: String,
        status: Option<HighlightStatus>,
    },

    /// Canvas highlight for an edge
    #[serde(rename_all = "camelCase")]
    EdgeHighlight { edge_id: String, active: bool },

    /// The simulator reached a node
    #[serde(rename_all = "camelCase")]
    SimulationStep {
        node_id: String,
        index: usize,
        total: usize,
    },
}

impl FlowEvent {
    /// Create a node highlight event
    pub fn highlight(node_id: &str, status: Option<HighlightStatus>) -> Self {
        Self::NodeHighlight {
            node_id: node_id.to_string(),
            status,
        }
    }

    /// Create an edge highlight event
    pub fn edge(edge_id: &str, active: bool) -> Self {
        Self::EdgeHighlight {
            edge_id: edge_id.to_string(),
            active,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: FlowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<FlowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<FlowEvent> {
        self.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FlowEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        self.lock().push(event);
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<FlowEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::channel_closed())
    }
}

/// Send an event, logging instead of failing when the observer is gone
pub(crate) fn emit(sink: &dyn EventSink, event: FlowEvent) {
    if let Err(e) = sink.send(event) {
        log::trace!("Dropped flow event: {}", e);
    }
}
