//! Moves demand from overloaded nodes to lightly loaded ones.
//!
//! Candidates on both sides come from the graph's utilization index. A transfer between two
//! nodes only happens if the path finder connects them; the path itself is not used to route
//! flow, only demand figures change.
use crate::config::Config;
use crate::graph::{ElectricalNetworkGraph, NetworkNode, NodeUpdate};
use crate::pathfinding::{AStar, PathFinder};
use crate::types::{Load, Utilization};
use crate::Result;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;

/// Load figures of a node at the time it was selected.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeUtilization {
    pub node_id: String,
    pub utilization: Utilization,
    pub load: Load,
    pub capacity: Load,
}

impl From<&NetworkNode> for NodeUtilization {
    fn from(node: &NetworkNode) -> Self {
        NodeUtilization {
            node_id: node.id.clone(),
            utilization: if node.capacity > 0.0 {
                node.demand / node.capacity
            } else {
                0.0
            },
            load: node.demand,
            capacity: node.capacity,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalancedNode {
    pub node_id: String,
    pub old_load: Load,
    pub new_load: Load,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalanceResult {
    /// True if at least one transfer happened.
    pub success: bool,
    /// Two entries per transfer: the source, then the receiver.
    pub balanced_nodes: Vec<BalancedNode>,
    /// Change of the network efficiency as a fraction (0.01 is one percentage point).
    pub efficiency_gain: f64,
    pub messages: Vec<String>,
}

impl LoadBalanceResult {
    fn nothing_done(message: &str) -> Self {
        LoadBalanceResult {
            success: false,
            balanced_nodes: Vec::new(),
            efficiency_gain: 0.0,
            messages: vec![message.to_string()],
        }
    }

    pub fn transfers(&self) -> usize {
        self.balanced_nodes.len() / 2
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceStats {
    pub overloaded_count: usize,
    pub underloaded_count: usize,
    /// Mean utilization of the active nodes with positive capacity.
    pub avg_utilization: Utilization,
}

/// One balancing pass over a graph.
pub struct LoadBalancer<'g, P: PathFinder = AStar> {
    graph: &'g mut ElectricalNetworkGraph,
    path_finder: P,
    overload_threshold: Utilization,
    transfer_ratio: f64,
}

impl<'g> LoadBalancer<'g> {
    pub fn new(graph: &'g mut ElectricalNetworkGraph) -> Self {
        Self::with_config(graph, &Config::default())
    }

    pub fn with_config(graph: &'g mut ElectricalNetworkGraph, config: &Config) -> Self {
        LoadBalancer {
            graph,
            path_finder: AStar::default(),
            overload_threshold: config.overload_threshold,
            transfer_ratio: config.transfer_ratio,
        }
    }
}

impl<'g, P: PathFinder> LoadBalancer<'g, P> {
    /// Uses another path finder to decide whether two nodes are connected.
    pub fn with_path_finder<Q: PathFinder>(self, path_finder: Q) -> LoadBalancer<'g, Q> {
        LoadBalancer {
            graph: self.graph,
            path_finder,
            overload_threshold: self.overload_threshold,
            transfer_ratio: self.transfer_ratio,
        }
    }

    /// Nodes at or above the overload threshold, most utilized first.
    pub fn find_overloaded_nodes(&mut self) -> Vec<NodeUtilization> {
        self.graph
            .find_nodes_above_utilization(self.overload_threshold)
            .iter()
            .map(NodeUtilization::from)
            .sorted_by_key(|n| Reverse(OrderedFloat(n.utilization)))
            .collect()
    }

    /// Up to `max_count` nodes below the overload threshold that have spare capacity, least
    /// utilized first.
    pub fn find_underloaded_nodes(&mut self, max_count: usize) -> Vec<NodeUtilization> {
        self.graph
            .find_nodes_below_utilization(self.overload_threshold)
            .iter()
            .map(NodeUtilization::from)
            .filter(|n| n.capacity > n.load)
            .sorted_by_key(|n| OrderedFloat(n.utilization))
            .take(max_count)
            .collect()
    }

    fn demand_of(&self, node_id: &str) -> Load {
        self.graph.get_node(node_id).map_or(0.0, |n| n.demand)
    }

    /// Runs one balancing pass.
    ///
    /// For every overloaded node the excess over the threshold is offered to the candidates in
    /// turn, each taking at most `transfer_ratio` of its spare capacity.
    pub fn balance_load(&mut self) -> Result<LoadBalanceResult> {
        let overloaded = self.find_overloaded_nodes();
        if overloaded.is_empty() {
            return Ok(LoadBalanceResult::nothing_done("No overloaded nodes found"));
        }
        let underloaded = self.find_underloaded_nodes(overloaded.len() * 2);
        if underloaded.is_empty() {
            return Ok(LoadBalanceResult::nothing_done(
                "No nodes available to receive additional load",
            ));
        }

        let efficiency_before = self.graph.compute_efficiency() / 100.0;
        let mut balanced_nodes = Vec::new();
        let mut messages = Vec::new();

        for source in &overloaded {
            let mut remaining =
                self.demand_of(&source.node_id) - source.capacity * self.overload_threshold;
            if remaining <= 0.0 {
                continue;
            }

            for target in &underloaded {
                if remaining <= 0.0 {
                    break;
                }
                if target.node_id == source.node_id {
                    continue;
                }
                let target_load = self.demand_of(&target.node_id);
                let amount = remaining.min((target.capacity - target_load) * self.transfer_ratio);
                if amount <= 0.0 {
                    continue;
                }

                let path = self
                    .path_finder
                    .find_path(self.graph, &source.node_id, &target.node_id);
                if !path.is_found() {
                    messages.push(format!(
                        "No path found between {} and {}",
                        source.node_id, target.node_id
                    ));
                    continue;
                }

                let source_load = self.demand_of(&source.node_id);
                let new_source_load = (source_load - amount).max(0.0);
                let new_target_load = (target_load + amount).min(target.capacity);
                self.graph
                    .update_node(&source.node_id, NodeUpdate::demand(new_source_load))?;
                self.graph
                    .update_node(&target.node_id, NodeUpdate::demand(new_target_load))?;
                log::debug!(
                    "Moved {:.2} from {} to {}",
                    amount,
                    source.node_id,
                    target.node_id
                );

                balanced_nodes.push(BalancedNode {
                    node_id: source.node_id.clone(),
                    old_load: source_load,
                    new_load: new_source_load,
                });
                balanced_nodes.push(BalancedNode {
                    node_id: target.node_id.clone(),
                    old_load: target_load,
                    new_load: new_target_load,
                });
                messages.push(format!(
                    "Redistributed {:.2} from {} to {} via {} hops",
                    amount,
                    source.node_id,
                    target.node_id,
                    path.hops()
                ));
                remaining -= amount;
            }
        }

        let efficiency_gain = self.graph.compute_efficiency() / 100.0 - efficiency_before;
        if !balanced_nodes.is_empty() {
            messages.insert(
                0,
                format!(
                    "Balancing complete: {} transfers performed. Efficiency gain: {:.2}%",
                    balanced_nodes.len() / 2,
                    efficiency_gain * 100.0
                ),
            );
        }

        Ok(LoadBalanceResult {
            success: !balanced_nodes.is_empty(),
            balanced_nodes,
            efficiency_gain,
            messages,
        })
    }

    /// True if the node is active, has capacity and is at or above the overload threshold.
    pub fn is_node_overloaded(&self, node_id: &str) -> bool {
        self.graph
            .get_node(node_id)
            .and_then(NetworkNode::utilization)
            .map_or(false, |u| u >= self.overload_threshold)
    }

    pub fn balance_stats(&mut self) -> BalanceStats {
        let overloaded_count = self.find_overloaded_nodes().len();
        let underloaded_count = self.find_underloaded_nodes(usize::MAX).len();
        let utilizations: Vec<Utilization> =
            self.graph.nodes().filter_map(NetworkNode::utilization).collect();
        let avg_utilization = if utilizations.is_empty() {
            0.0
        } else {
            utilizations.iter().sum::<f64>() / utilizations.len() as f64
        };
        BalanceStats {
            overloaded_count,
            underloaded_count,
            avg_utilization,
        }
    }
}
