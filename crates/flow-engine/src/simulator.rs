//! Topological highlight simulator
//!
//! Walks a graph in breadth-first order from its source nodes and drives
//! canvas highlights with fixed delays. Nothing is executed: no handlers, no
//! variables, no branching.
//!
//! Pause and reset go through a [`watch`] channel shared with every
//! [`SimulationHandle`]. Pause takes effect before the next step; reset is
//! observed at the next delay or pause point and stops the walk.
//!
//! Highlight changes are published while holding the visual state lock and
//! only after re-reading the signal, so nothing is highlighted after a reset
//! has cleared the canvas. A completed walk holds its final highlights for
//! `clear_delay` and then clears them.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::SimulationConfig;
use crate::events::{emit, EventSink, FlowEvent, HighlightStatus};
use crate::types::{EdgeId, FlowGraph, GraphNode, NodeId};

/// Lifecycle of the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

/// One highlight transition recorded during a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedStep {
    pub node_id: NodeId,
    pub status: HighlightStatus,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub steps: Vec<SimulatedStep>,
    pub total_duration_ms: u64,
    /// False when the walk was stopped by a reset
    pub completed: bool,
}

impl SimulationResult {
    /// Node IDs in the order their highlight began
    pub fn visit_order(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == HighlightStatus::Executing)
            .map(|s| s.node_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Run,
    Pause,
    Reset,
}

#[derive(Debug, Default)]
struct VisualState {
    nodes: Vec<NodeId>,
    active_edge: Option<EdgeId>,
}

/// Stopped by a reset
struct Aborted;

/// Cloneable control surface for a running simulator
#[derive(Clone)]
pub struct SimulationHandle {
    signal: Arc<watch::Sender<Signal>>,
    status: Arc<watch::Sender<SimulationStatus>>,
    visual: Arc<Mutex<VisualState>>,
}

impl SimulationHandle {
    fn new() -> Self {
        let (signal, _) = watch::channel(Signal::Run);
        let (status, _) = watch::channel(SimulationStatus::Idle);
        Self {
            signal: Arc::new(signal),
            status: Arc::new(status),
            visual: Arc::new(Mutex::new(VisualState::default())),
        }
    }

    /// Hold before the next step
    pub fn pause(&self) {
        self.signal.send_replace(Signal::Pause);
    }

    /// Continue after a pause
    pub fn resume(&self) {
        self.signal.send_if_modified(|signal| {
            if *signal == Signal::Pause {
                *signal = Signal::Run;
                true
            } else {
                false
            }
        });
    }

    /// Stop any running walk, clear every highlight it set, and return to idle
    pub fn reset(&self, event_sink: &dyn EventSink) {
        self.signal.send_replace(Signal::Reset);

        let cleared = clear_visual(&mut self.visual(), event_sink);
        self.status.send_replace(SimulationStatus::Idle);
        log::debug!("Simulation reset, cleared {} highlights", cleared);
    }

    pub fn status(&self) -> SimulationStatus {
        *self.status.borrow()
    }

    fn set_status(&self, status: SimulationStatus) {
        self.status.send_replace(status);
    }

    fn visual(&self) -> MutexGuard<'_, VisualState> {
        self.visual.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Visual state for a walk that has not been reset
    fn live_visual(&self, rx: &watch::Receiver<Signal>) -> Result<MutexGuard<'_, VisualState>, Aborted> {
        let visual = self.visual();
        if *rx.borrow() == Signal::Reset {
            return Err(Aborted);
        }
        Ok(visual)
    }
}

/// Turn off every highlight in `state`, returning how many nodes were cleared
fn clear_visual(state: &mut VisualState, event_sink: &dyn EventSink) -> usize {
    let state = std::mem::take(state);
    if let Some(edge_id) = state.active_edge {
        emit(event_sink, FlowEvent::edge(&edge_id, false));
    }
    for node_id in &state.nodes {
        emit(event_sink, FlowEvent::highlight(node_id, None));
    }
    state.nodes.len()
}

/// Replays a graph's topological order as timed highlights
pub struct HighlightSimulator {
    config: SimulationConfig,
    handle: SimulationHandle,
    run_lock: tokio::sync::Mutex<()>,
}

impl HighlightSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            handle: SimulationHandle::new(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Control handle for pause, resume, and reset
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> SimulationStatus {
        self.handle.status()
    }

    /// Walk the graph. Concurrent calls run one after another.
    pub async fn run(&self, graph: &FlowGraph, event_sink: &dyn EventSink) -> SimulationResult {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();

        // A pause requested before start still applies; a stale reset does not
        self.handle.signal.send_if_modified(|signal| {
            if *signal == Signal::Reset {
                *signal = Signal::Run;
                true
            } else {
                false
            }
        });
        let mut rx = self.handle.signal.subscribe();
        self.handle.set_status(SimulationStatus::Running);

        let order = execution_order(graph);
        log::info!("Simulating {} nodes of graph '{}'", order.len(), graph.id);

        let mut steps = Vec::with_capacity(order.len() * 2);
        let completed = self
            .walk(graph, &order, &mut rx, &mut steps, event_sink)
            .await
            .is_ok();
        let total_duration_ms = started.elapsed().as_millis() as u64;

        if completed {
            // A reset during the hold has already cleared everything
            if self.clear_after_hold(&mut rx, event_sink).await.is_ok() {
                self.handle.set_status(SimulationStatus::Completed);
            }
        } else {
            log::info!("Simulation stopped after {} steps", steps.len());
        }

        SimulationResult {
            steps,
            total_duration_ms,
            completed,
        }
    }

    async fn walk(
        &self,
        graph: &FlowGraph,
        order: &[NodeId],
        rx: &mut watch::Receiver<Signal>,
        steps: &mut Vec<SimulatedStep>,
        event_sink: &dyn EventSink,
    ) -> Result<(), Aborted> {
        let total = order.len();
        for (index, node_id) in order.iter().enumerate() {
            self.wait_until_running(rx).await?;

            {
                let mut visual = self.handle.live_visual(rx)?;
                visual.nodes.push(node_id.clone());
                emit(
                    event_sink,
                    FlowEvent::SimulationStep {
                        node_id: node_id.clone(),
                        index,
                        total,
                    },
                );
                emit(event_sink, FlowEvent::highlight(node_id, Some(HighlightStatus::Executing)));
            }
            steps.push(step(node_id, HighlightStatus::Executing));

            self.delay(rx, self.config.step_delay()).await?;

            {
                let _visual = self.handle.live_visual(rx)?;
                emit(event_sink, FlowEvent::highlight(node_id, Some(HighlightStatus::Success)));
            }
            steps.push(step(node_id, HighlightStatus::Success));

            let next_edge = order
                .get(index + 1)
                .and_then(|next| graph.edge_between(node_id, next));
            if let Some(edge) = next_edge {
                {
                    let mut visual = self.handle.live_visual(rx)?;
                    visual.active_edge = Some(edge.id.clone());
                    emit(event_sink, FlowEvent::edge(&edge.id, true));
                }
                self.delay(rx, self.config.edge_delay()).await?;
                {
                    let mut visual = self.handle.live_visual(rx)?;
                    emit(event_sink, FlowEvent::edge(&edge.id, false));
                    visual.active_edge = None;
                }
            }

            self.delay(rx, self.config.settle_delay()).await?;
        }
        Ok(())
    }

    /// Keep the final highlights up for `clear_delay`, then clear them
    async fn clear_after_hold(
        &self,
        rx: &mut watch::Receiver<Signal>,
        event_sink: &dyn EventSink,
    ) -> Result<(), Aborted> {
        self.delay(rx, self.config.clear_delay()).await?;
        let mut visual = self.handle.live_visual(rx)?;
        let cleared = clear_visual(&mut visual, event_sink);
        log::debug!("Simulation finished, cleared {} highlights", cleared);
        Ok(())
    }

    /// Block while paused; fail on reset
    async fn wait_until_running(&self, rx: &mut watch::Receiver<Signal>) -> Result<(), Aborted> {
        loop {
            let signal = *rx.borrow_and_update();
            match signal {
                Signal::Run => {
                    if self.handle.status() == SimulationStatus::Paused {
                        self.handle.set_status(SimulationStatus::Running);
                    }
                    return Ok(());
                }
                Signal::Reset => return Err(Aborted),
                Signal::Pause => {
                    self.handle.set_status(SimulationStatus::Paused);
                    if rx.changed().await.is_err() {
                        return Err(Aborted);
                    }
                }
            }
        }
    }

    /// Sleep for `duration` unless a reset arrives first
    async fn delay(&self, rx: &mut watch::Receiver<Signal>, duration: Duration) -> Result<(), Aborted> {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = rx.changed() => {
                    if changed.is_err() {
                        (&mut sleep).await;
                        return Ok(());
                    }
                    if *rx.borrow_and_update() == Signal::Reset {
                        return Err(Aborted);
                    }
                }
            }
        }
    }
}

fn step(node_id: &str, status: HighlightStatus) -> SimulatedStep {
    SimulatedStep {
        node_id: node_id.to_string(),
        status,
        timestamp: Utc::now(),
    }
}

/// Nodes with no incoming edge, in declaration order
pub fn start_nodes(graph: &FlowGraph) -> Vec<&GraphNode> {
    graph
        .nodes
        .iter()
        .filter(|n| graph.incoming_edges(&n.id).is_empty())
        .collect()
}

/// Breadth-first order from the start nodes, each node once
pub fn execution_order(graph: &FlowGraph) -> Vec<NodeId> {
    let mut queue: VecDeque<&str> = start_nodes(graph).iter().map(|n| n.id.as_str()).collect();
    if queue.is_empty() && !graph.nodes.is_empty() {
        log::warn!("Graph '{}' has no start nodes; nothing to simulate", graph.id);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            continue;
        }
        order.push(node_id.to_string());
        for edge in graph.outgoing_edges(node_id) {
            if !visited.contains(edge.target.as_str()) {
                queue.push_back(&edge.target);
            }
        }
    }
    order
}
