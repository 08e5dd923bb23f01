//! One discrete simulation tick: apply the next queued event, scan for critical conditions,
//! rebalance if needed and report metrics.
use crate::balance::LoadBalancer;
use crate::config::Config;
use crate::events::{Event, EventKind, Target};
use crate::graph::{
    EdgeUpdate, ElectricalNetworkGraph, NetworkEdge, NodeStatus, NodeType, NodeUpdate,
};
use crate::queue::{FifoQueue, MinHeap};
use crate::types::{Load, Severity};
use crate::Result;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod tests;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Chronological log of a cycle. Every entry is also sent to the `log` facade.
#[derive(Debug, Default)]
pub struct LogBook {
    entries: Vec<SimulationLog>,
}

impl LogBook {
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => log::info!("{}", message),
            LogLevel::Warning => log::warn!("{}", message),
            LogLevel::Error => log::error!("{}", message),
        }
        self.entries.push(SimulationLog {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Success, message);
    }

    pub fn entries(&self) -> &[SimulationLog] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry from index `from` on is a warning or an error.
    fn has_alerts_since(&self, from: usize) -> bool {
        self.entries[from..]
            .iter()
            .any(|e| matches!(e.level, LogLevel::Warning | LogLevel::Error))
    }

    pub fn into_entries(self) -> Vec<SimulationLog> {
        self.entries
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeProjection {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub capacity: Load,
    pub demand: Load,
    pub status: NodeStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GraphProjection {
    pub nodes: Vec<NodeProjection>,
    pub edges: Vec<NetworkEdge>,
}

impl GraphProjection {
    fn of(graph: &ElectricalNetworkGraph) -> Self {
        GraphProjection {
            nodes: graph
                .nodes()
                .map(|n| NodeProjection {
                    id: n.id.clone(),
                    node_type: n.node_type,
                    capacity: n.capacity,
                    demand: n.demand,
                    status: n.status,
                })
                .collect(),
            edges: graph.get_all_edges(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub losses: f64,
    pub efficiency: f64,
    pub consumption: Load,
}

impl Metrics {
    pub fn of(graph: &ElectricalNetworkGraph) -> Self {
        Metrics {
            losses: graph.compute_losses(),
            efficiency: graph.compute_efficiency(),
            consumption: graph.compute_consumption(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvents {
    pub fifo: usize,
    pub heap: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub graph: GraphProjection,
    pub metrics: Metrics,
    pub logs: Vec<SimulationLog>,
    pub pending_events: PendingEvents,
}

/// Runs one cycle with the default thresholds.
pub fn run_simulation_cycle(
    graph: &mut ElectricalNetworkGraph,
    fifo: &mut FifoQueue,
    heap: &mut MinHeap,
) -> SimulationResult {
    run_simulation_cycle_with(graph, fifo, heap, &Config::default())
}

/// Runs one cycle.
///
/// 1. Takes at most one event from `fifo` and applies it. Failures become error logs.
/// 2. Pushes an alert onto `heap` for every overloaded node or edge, and one for the set of
///    failed nodes.
/// 3. If step 2 logged a warning or an error, runs a load balancing pass.
/// 4. Reports the network, its metrics, the logs and the queue sizes.
pub fn run_simulation_cycle_with(
    graph: &mut ElectricalNetworkGraph,
    fifo: &mut FifoQueue,
    heap: &mut MinHeap,
    config: &Config,
) -> SimulationResult {
    let mut logs = LogBook::default();

    match fifo.dequeue() {
        None => logs.info("No events in the FIFO queue to process"),
        Some(event) => {
            logs.info(format!("Processing event: {}", event.type_name()));
            if let Err(err) = apply_event(graph, &event, config, &mut logs) {
                logs.error(format!(
                    "Error applying event {}: {}",
                    event.type_name(),
                    err
                ));
            }
        }
    }

    let scan_start = logs.len();
    check_critical_conditions(graph, heap, config, &mut logs);
    if logs.has_alerts_since(scan_start) {
        rebalance(graph, config, &mut logs);
    }

    let metrics = Metrics::of(graph);
    logs.info(format!(
        "Metrics recalculated: losses={:.2}, efficiency={:.2}%, consumption={:.2}",
        metrics.losses, metrics.efficiency, metrics.consumption
    ));

    SimulationResult {
        graph: GraphProjection::of(graph),
        metrics,
        logs: logs.into_entries(),
        pending_events: PendingEvents {
            fifo: fifo.size(),
            heap: heap.size(),
        },
    }
}

/// Applies a single event to the graph, logging what changed.
///
/// Events naming a node or edge that does not exist are reported as warnings. Errors are only
/// returned when the graph rejects the new values.
pub fn apply_event(
    graph: &mut ElectricalNetworkGraph,
    event: &Event,
    config: &Config,
    logs: &mut LogBook,
) -> Result<()> {
    match &event.kind {
        EventKind::DemandChange { node_id, demand } => match graph.get_node(node_id) {
            Some(node) => {
                let old = node.demand;
                graph.update_node(node_id, NodeUpdate::demand(*demand))?;
                logs.info(format!(
                    "Demand of node {} changed from {} to {}",
                    node_id, old, demand
                ));
            }
            None => logs.warning(format!("Node {} not found for demand change", node_id)),
        },
        EventKind::NodeFailure { node_id } => {
            if graph.get_node(node_id).is_some() {
                graph.update_node(node_id, NodeUpdate::status(NodeStatus::Inactive))?;
                logs.error(format!("Node {} failed and was deactivated", node_id));
            } else {
                logs.warning(format!("Node {} not found for failure", node_id));
            }
        }
        EventKind::NodeRecovery { node_id } => {
            if graph.get_node(node_id).is_some() {
                graph.update_node(node_id, NodeUpdate::status(NodeStatus::Active))?;
                logs.success(format!("Node {} recovered and reactivated", node_id));
            } else {
                logs.warning(format!("Node {} not found for recovery", node_id));
            }
        }
        EventKind::Overload { target, multiplier } => {
            let multiplier = multiplier.unwrap_or(config.default_overload_multiplier);
            match target {
                Target::Node(id) => match graph.get_node(id) {
                    Some(node) => {
                        let demand = node.demand * multiplier;
                        graph.update_node(id, NodeUpdate::demand(demand))?;
                        logs.warning(format!(
                            "Node {} overloaded: demand increased to {:.2}",
                            id, demand
                        ));
                    }
                    None => logs.warning(format!("Node {} not found for overload", id)),
                },
                Target::Edge(id) => match graph.get_edge(id) {
                    Some(edge) => {
                        let flow = edge.current_flow * multiplier;
                        graph.update_edge(id, EdgeUpdate::current_flow(flow))?;
                        logs.warning(format!(
                            "Edge {} overloaded: flow increased to {:.2}",
                            id, flow
                        ));
                    }
                    None => logs.warning(format!("Edge {} not found for overload", id)),
                },
            }
        }
        EventKind::CapacityChange { target, capacity } => match target {
            Target::Node(id) => match graph.get_node(id) {
                Some(node) => {
                    let old = node.capacity;
                    graph.update_node(id, NodeUpdate::capacity(*capacity))?;
                    logs.info(format!(
                        "Capacity of node {} changed from {} to {}",
                        id, old, capacity
                    ));
                }
                None => logs.warning(format!("Node {} not found for capacity change", id)),
            },
            Target::Edge(id) => match graph.get_edge(id) {
                Some(edge) => {
                    let old = edge.capacity;
                    graph.update_edge(id, EdgeUpdate::capacity(*capacity))?;
                    logs.info(format!(
                        "Capacity of edge {} changed from {} to {}",
                        id, old, capacity
                    ));
                }
                None => logs.warning(format!("Edge {} not found for capacity change", id)),
            },
        },
        EventKind::CriticalOverload { .. }
        | EventKind::CriticalEdgeOverload { .. }
        | EventKind::CriticalNodeFailure { .. } => logs.warning(format!(
            "Alert event {} does not change the network",
            event.type_name()
        )),
        EventKind::Unknown { type_name, .. } => {
            logs.warning(format!("Unknown event type: {}", type_name))
        }
    }
    Ok(())
}

fn alert(kind: EventKind, severity: Severity) -> Event {
    Event {
        kind,
        severity,
        created_at: Utc::now(),
    }
}

/// Pushes alerts for overloaded nodes and edges and for failed nodes.
pub fn check_critical_conditions(
    graph: &ElectricalNetworkGraph,
    heap: &mut MinHeap,
    config: &Config,
    logs: &mut LogBook,
) {
    let level_of = |utilization: f64| {
        if utilization >= config.critical_threshold {
            (0, LogLevel::Error)
        } else {
            (1, LogLevel::Warning)
        }
    };

    for node in graph.nodes() {
        let utilization = match node.utilization() {
            Some(u) if u >= config.overload_threshold => u,
            _ => continue,
        };
        let (severity, level) = level_of(utilization);
        heap.insert(alert(
            EventKind::CriticalOverload {
                node_id: node.id.clone(),
                utilization,
                demand: node.demand,
                capacity: node.capacity,
            },
            severity,
        ));
        logs.push(
            level,
            format!(
                "Critical condition detected: node {} at {:.1}% utilization",
                node.id,
                utilization * 100.0
            ),
        );
    }

    for edge in graph.edges() {
        let utilization = match edge.utilization() {
            Some(u) if u >= config.overload_threshold => u,
            _ => continue,
        };
        let (severity, level) = level_of(utilization);
        heap.insert(alert(
            EventKind::CriticalEdgeOverload {
                edge_id: edge.id.clone(),
                utilization,
                current_flow: edge.current_flow,
                capacity: edge.capacity,
            },
            severity,
        ));
        logs.push(
            level,
            format!(
                "Critical condition detected: edge {} at {:.1}% utilization",
                edge.id,
                utilization * 100.0
            ),
        );
    }

    let inactive_nodes: Vec<String> = graph
        .nodes()
        .filter(|n| n.status == NodeStatus::Inactive)
        .map(|n| n.id.clone())
        .collect();
    if !inactive_nodes.is_empty() {
        let count = inactive_nodes.len();
        let (severity, level) = if count > config.failure_alarm_count {
            (0, LogLevel::Error)
        } else {
            (2, LogLevel::Warning)
        };
        heap.insert(alert(
            EventKind::CriticalNodeFailure {
                inactive_count: count,
                inactive_nodes,
            },
            severity,
        ));
        logs.push(level, format!("{} inactive node(s) in the network", count));
    }
}

fn rebalance(graph: &mut ElectricalNetworkGraph, config: &Config, logs: &mut LogBook) {
    let result = match LoadBalancer::with_config(graph, config).balance_load() {
        Ok(result) => result,
        Err(err) => {
            logs.warning(format!("Automatic load balancing failed: {}", err));
            return;
        }
    };

    if result.success {
        logs.success(format!(
            "Automatic load balancing: {} transfers performed",
            result.transfers()
        ));
        for message in result.messages.iter().take(config.max_detail_messages) {
            logs.info(format!("  -> {}", message));
        }
        if result.efficiency_gain > 0.0 {
            logs.success(format!(
                "Efficiency gain: +{:.2}%",
                result.efficiency_gain * 100.0
            ));
        }
    } else {
        let reason = result.messages.first().map_or("", String::as_str);
        logs.info(format!("Automatic load balancing made no transfers: {}", reason));
    }
}
