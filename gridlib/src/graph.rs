//! Electrical network model: nodes, edges, derived metrics and the utilization index.
use crate::avl::{AvlNode, AvlTree};
use crate::types::*;
use crate::utils::{finite, non_negative, now_millis, random_base36};
use crate::{GridError, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
mod tests;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Producer,
    #[default]
    Consumer,
    Substation,
    Transmission,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub capacity: Load,
    pub demand: Load,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl NetworkNode {
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    /// Demand over capacity. Only defined for active nodes with positive capacity.
    pub fn utilization(&self) -> Option<Utilization> {
        if self.is_active() && self.capacity > 0.0 {
            Some(self.demand / self.capacity)
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEdge {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub resistance: f64,
    pub capacity: Load,
    #[serde(default)]
    pub current_flow: Load,
}

impl NetworkEdge {
    /// Absolute flow over capacity, for edges with positive capacity.
    pub fn utilization(&self) -> Option<Utilization> {
        if self.capacity > 0.0 {
            Some(self.current_flow.abs() / self.capacity)
        } else {
            None
        }
    }

    /// Path finding weight. A zero resistance counts as 1.
    pub fn weight(&self) -> f64 {
        if self.resistance > 0.0 {
            self.resistance
        } else {
            1.0
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.origin == node_id || self.destination == node_id
    }

    /// True if this edge joins `a` and `b` in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.origin == a && self.destination == b) || (self.origin == b && self.destination == a)
    }
}

/// Parameters of a node to add. A missing id is generated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    pub capacity: Load,
    #[serde(default)]
    pub demand: Load,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeSpec {
    pub fn new(node_type: NodeType, capacity: Load, demand: Load) -> Self {
        NodeSpec {
            node_type,
            capacity,
            demand,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Parameters of an edge to add. A missing id is taken from the edge counter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub resistance: f64,
    #[serde(default)]
    pub capacity: Load,
    #[serde(default)]
    pub current_flow: Load,
}

impl EdgeSpec {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        resistance: f64,
        capacity: Load,
    ) -> Self {
        EdgeSpec {
            origin: origin.into(),
            destination: destination.into(),
            resistance,
            capacity,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_flow(mut self, current_flow: Load) -> Self {
        self.current_flow = current_flow;
        self
    }
}

/// Partial update of a node. `None` fields are left unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUpdate {
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    pub capacity: Option<Load>,
    pub demand: Option<Load>,
    pub status: Option<NodeStatus>,
    pub name: Option<String>,
}

impl NodeUpdate {
    pub fn demand(demand: Load) -> Self {
        NodeUpdate {
            demand: Some(demand),
            ..Default::default()
        }
    }

    pub fn capacity(capacity: Load) -> Self {
        NodeUpdate {
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    pub fn status(status: NodeStatus) -> Self {
        NodeUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    fn touches_index(&self) -> bool {
        self.capacity.is_some() || self.demand.is_some() || self.status.is_some()
    }
}

/// Partial update of an edge. `None` fields are left unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeUpdate {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub resistance: Option<f64>,
    pub capacity: Option<Load>,
    pub current_flow: Option<Load>,
}

impl EdgeUpdate {
    pub fn capacity(capacity: Load) -> Self {
        EdgeUpdate {
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    pub fn current_flow(current_flow: Load) -> Self {
        EdgeUpdate {
            current_flow: Some(current_flow),
            ..Default::default()
        }
    }
}

/// Key of the utilization index: scaled utilization, ties broken by node id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadKey {
    pub scaled: i64,
    pub node_id: String,
}

/// Value of the utilization index.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationEntry {
    pub node_id: String,
    pub load: Load,
    pub capacity: Load,
    pub utilization: Utilization,
}

pub type LoadIndex = AvlTree<LoadKey, UtilizationEntry>;

fn scale(utilization: Utilization) -> f64 {
    utilization * UTILIZATION_SCALE
}

/// Persisted form of a graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    #[serde(default = "first_edge_id")]
    pub edge_id_counter: u64,
}

fn first_edge_id() -> u64 {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeTypeCounts {
    pub producer: usize,
    pub consumer: usize,
    pub substation: usize,
    pub transmission: usize,
}

impl NodeTypeCounts {
    fn count(&mut self, node_type: NodeType) {
        match node_type {
            NodeType::Producer => self.producer += 1,
            NodeType::Consumer => self.consumer += 1,
            NodeType::Substation => self.substation += 1,
            NodeType::Transmission => self.transmission += 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_losses: f64,
    pub total_efficiency: f64,
    pub total_consumption: Load,
    pub nodes_by_type: NodeTypeCounts,
    pub active_nodes: usize,
    /// Nodes that are not active, including those under maintenance.
    pub inactive_nodes: usize,
}

/// The distribution network.
///
/// Nodes and edges are kept ordered by id so that every traversal is deterministic. The
/// utilization index is a cache: it is dropped whenever a node changes and rebuilt on the next
/// query that needs it.
#[derive(Debug, Clone)]
pub struct ElectricalNetworkGraph {
    nodes: BTreeMap<String, NetworkNode>,
    edges: BTreeMap<String, NetworkEdge>,
    edge_id_counter: u64,
    load_index: Option<LoadIndex>,
}

impl Default for ElectricalNetworkGraph {
    fn default() -> Self {
        ElectricalNetworkGraph {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            edge_id_counter: first_edge_id(),
            load_index: None,
        }
    }
}

impl ElectricalNetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate_index(&mut self) {
        self.load_index = None;
    }

    fn mint_node_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id = format!("node-{}-{}", now_millis(), random_base36(&mut rng, 9));
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn mint_edge_id(&mut self) -> String {
        loop {
            let id = format!("edge-{}", self.edge_id_counter);
            self.edge_id_counter += 1;
            if !self.edges.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NetworkNode> {
        let capacity = non_negative("capacity", spec.capacity)?;
        let demand = non_negative("demand", spec.demand)?;
        let id = match spec.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.mint_node_id(),
        };
        if self.nodes.contains_key(&id) {
            return Err(GridError::DuplicateNode(id));
        }

        let node = NetworkNode {
            id: id.clone(),
            node_type: spec.node_type,
            capacity,
            demand,
            status: spec.status,
            name: spec.name,
        };
        self.nodes.insert(id, node.clone());
        self.invalidate_index();
        Ok(node)
    }

    /// Checks that an edge from `origin` to `destination` may exist, ignoring the edge `except`.
    fn check_endpoints(&self, origin: &str, destination: &str, except: Option<&str>) -> Result<()> {
        for endpoint in [origin, destination] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GridError::NodeNotFound(endpoint.to_string()));
            }
        }
        if origin == destination {
            return Err(GridError::SelfLoop(origin.to_string()));
        }
        let parallel = self
            .edges
            .values()
            .any(|e| Some(e.id.as_str()) != except && e.connects(origin, destination));
        if parallel {
            return Err(GridError::ParallelEdge {
                origin: origin.to_string(),
                destination: destination.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_edge(&mut self, spec: EdgeSpec) -> Result<NetworkEdge> {
        let resistance = non_negative("resistance", spec.resistance)?;
        let capacity = non_negative("capacity", spec.capacity)?;
        let current_flow = finite("currentFlow", spec.current_flow)?;
        let id = spec.id.filter(|id| !id.is_empty());
        if let Some(id) = &id {
            if self.edges.contains_key(id) {
                return Err(GridError::DuplicateEdge(id.clone()));
            }
        }
        self.check_endpoints(&spec.origin, &spec.destination, None)?;

        let id = match id {
            Some(id) => id,
            None => self.mint_edge_id(),
        };
        let edge = NetworkEdge {
            id: id.clone(),
            origin: spec.origin,
            destination: spec.destination,
            resistance,
            capacity,
            current_flow,
        };
        self.edges.insert(id, edge.clone());
        Ok(edge)
    }

    /// Removes a node together with every edge touching it. Returns false if there is no such
    /// node.
    pub fn remove_node(&mut self, id: &str) -> bool {
        if self.nodes.remove(id).is_none() {
            return false;
        }
        self.edges.retain(|_, edge| !edge.touches(id));
        self.invalidate_index();
        true
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        self.edges.remove(id).is_some()
    }

    /// Merges `update` into the node. Fails without changing anything if a value is invalid.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> Result<()> {
        let capacity = update
            .capacity
            .map(|v| non_negative("capacity", v))
            .transpose()?;
        let demand = update
            .demand
            .map(|v| non_negative("demand", v))
            .transpose()?;
        let touches_index = update.touches_index();
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GridError::NodeNotFound(id.to_string()))?;

        if let Some(node_type) = update.node_type {
            node.node_type = node_type;
        }
        if let Some(capacity) = capacity {
            node.capacity = capacity;
        }
        if let Some(demand) = demand {
            node.demand = demand;
        }
        if let Some(status) = update.status {
            node.status = status;
        }
        if update.name.is_some() {
            node.name = update.name;
        }
        if touches_index {
            self.invalidate_index();
        }
        Ok(())
    }

    /// Merges `update` into the edge. New endpoints are validated like in [`Self::add_edge`].
    pub fn update_edge(&mut self, id: &str, update: EdgeUpdate) -> Result<()> {
        let edge = self
            .edges
            .get(id)
            .ok_or_else(|| GridError::EdgeNotFound(id.to_string()))?;
        let resistance = update
            .resistance
            .map(|v| non_negative("resistance", v))
            .transpose()?;
        let capacity = update
            .capacity
            .map(|v| non_negative("capacity", v))
            .transpose()?;
        let current_flow = update
            .current_flow
            .map(|v| finite("currentFlow", v))
            .transpose()?;
        if update.origin.is_some() || update.destination.is_some() {
            let origin = update.origin.as_deref().unwrap_or(&edge.origin);
            let destination = update.destination.as_deref().unwrap_or(&edge.destination);
            self.check_endpoints(origin, destination, Some(id))?;
        }

        let edge = self
            .edges
            .get_mut(id)
            .ok_or_else(|| GridError::EdgeNotFound(id.to_string()))?;
        if let Some(origin) = update.origin {
            edge.origin = origin;
        }
        if let Some(destination) = update.destination {
            edge.destination = destination;
        }
        if let Some(resistance) = resistance {
            edge.resistance = resistance;
        }
        if let Some(capacity) = capacity {
            edge.capacity = capacity;
        }
        if let Some(current_flow) = current_flow {
            edge.current_flow = current_flow;
        }
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.get(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&NetworkEdge> {
        self.edges.get(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &NetworkEdge> {
        self.edges.values()
    }

    pub fn get_all_nodes(&self) -> Vec<NetworkNode> {
        self.nodes.values().cloned().collect()
    }

    pub fn get_all_edges(&self) -> Vec<NetworkEdge> {
        self.edges.values().cloned().collect()
    }

    pub fn get_edges_by_node(&self, node_id: &str) -> Vec<&NetworkEdge> {
        self.edges.values().filter(|e| e.touches(node_id)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Next number used to generate an edge id.
    pub fn get_edge_id_counter(&self) -> u64 {
        self.edge_id_counter
    }

    /// Resistive losses: sum of `flow² × resistance` over all edges.
    pub fn compute_losses(&self) -> f64 {
        self.edges
            .values()
            .map(|e| e.current_flow * e.current_flow * e.resistance)
            .sum()
    }

    /// Capacity of the active producers.
    pub fn compute_total_production(&self) -> Load {
        self.nodes
            .values()
            .filter(|n| n.is_active() && n.node_type == NodeType::Producer)
            .map(|n| n.capacity)
            .sum()
    }

    /// Share of the production that is not lost, as a percentage clamped to `[0, 100]`.
    /// Zero when nothing is produced.
    pub fn compute_efficiency(&self) -> f64 {
        let production = self.compute_total_production();
        if production == 0.0 {
            return 0.0;
        }
        let efficiency = (production - self.compute_losses()) / production * 100.0;
        efficiency.clamp(0.0, 100.0)
    }

    /// Demand of the active consumers.
    pub fn compute_consumption(&self) -> Load {
        self.nodes
            .values()
            .filter(|n| n.is_active() && n.node_type == NodeType::Consumer)
            .map(|n| n.demand)
            .sum()
    }

    pub fn get_stats(&self) -> NetworkStats {
        let mut nodes_by_type = NodeTypeCounts::default();
        let mut active_nodes = 0;
        for node in self.nodes.values() {
            nodes_by_type.count(node.node_type);
            if node.is_active() {
                active_nodes += 1;
            }
        }
        NetworkStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            total_losses: self.compute_losses(),
            total_efficiency: self.compute_efficiency(),
            total_consumption: self.compute_consumption(),
            nodes_by_type,
            active_nodes,
            inactive_nodes: self.nodes.len() - active_nodes,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replaces the whole network. The new content is validated first; on error the graph is
    /// left unchanged.
    pub fn restore(
        &mut self,
        nodes: Vec<NetworkNode>,
        edges: Vec<NetworkEdge>,
        edge_id_counter: u64,
    ) -> Result<()> {
        let mut graph = Self::default();
        for node in nodes {
            graph.add_node(NodeSpec {
                id: Some(node.id),
                node_type: node.node_type,
                capacity: node.capacity,
                demand: node.demand,
                status: node.status,
                name: node.name,
            })?;
        }
        for edge in edges {
            graph.add_edge(EdgeSpec {
                id: Some(edge.id),
                origin: edge.origin,
                destination: edge.destination,
                resistance: edge.resistance,
                capacity: edge.capacity,
                current_flow: edge.current_flow,
            })?;
        }
        graph.edge_id_counter = edge_id_counter.max(first_edge_id());
        *self = graph;
        Ok(())
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self.get_all_nodes(),
            edges: self.get_all_edges(),
            edge_id_counter: self.edge_id_counter,
        }
    }

    pub fn from_snapshot(snapshot: NetworkSnapshot) -> Result<Self> {
        let mut graph = Self::default();
        graph.restore(snapshot.nodes, snapshot.edges, snapshot.edge_id_counter)?;
        Ok(graph)
    }

    /// The utilization index of the active nodes with positive capacity, rebuilt if stale.
    pub fn load_index(&mut self) -> &LoadIndex {
        if self.load_index.is_none() {
            log::debug!("Rebuilding utilization index over {} nodes", self.nodes.len());
        }
        self.load_index
            .get_or_insert_with(|| build_load_index(&self.nodes))
    }

    /// Indexed nodes whose scaled utilization is at least `threshold × 10000`, ascending.
    pub fn find_nodes_above_utilization(&mut self, threshold: Utilization) -> Vec<NetworkNode> {
        let scaled = scale(threshold);
        let mut ids = Vec::new();
        collect_above(self.load_index().root(), scaled, &mut ids);
        self.lookup(ids)
    }

    /// Indexed nodes whose scaled utilization is at most `threshold × 10000`, ascending.
    pub fn find_nodes_below_utilization(&mut self, threshold: Utilization) -> Vec<NetworkNode> {
        let scaled = scale(threshold);
        let mut ids = Vec::new();
        collect_below(self.load_index().root(), scaled, &mut ids);
        self.lookup(ids)
    }

    fn lookup(&self, ids: Vec<String>) -> Vec<NetworkNode> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .cloned()
            .collect()
    }
}

fn build_load_index(nodes: &BTreeMap<String, NetworkNode>) -> LoadIndex {
    let mut index = AvlTree::new();
    for node in nodes.values() {
        if let Some(utilization) = node.utilization() {
            let key = LoadKey {
                scaled: scale(utilization).round() as i64,
                node_id: node.id.clone(),
            };
            let entry = UtilizationEntry {
                node_id: node.id.clone(),
                load: node.demand,
                capacity: node.capacity,
                utilization,
            };
            index.insert(key, entry);
        }
    }
    index
}

type IndexNode = AvlNode<LoadKey, UtilizationEntry>;

/// In-order walk skipping left subtrees whose keys are all below `threshold`.
fn collect_above(node: Option<&IndexNode>, threshold: f64, out: &mut Vec<String>) {
    let node = match node {
        Some(node) => node,
        None => return,
    };
    if (node.key().scaled as f64) < threshold {
        collect_above(node.right(), threshold, out);
    } else {
        collect_above(node.left(), threshold, out);
        out.push(node.value().node_id.clone());
        collect_above(node.right(), threshold, out);
    }
}

/// In-order walk skipping right subtrees whose keys are all above `threshold`.
fn collect_below(node: Option<&IndexNode>, threshold: f64, out: &mut Vec<String>) {
    let node = match node {
        Some(node) => node,
        None => return,
    };
    if (node.key().scaled as f64) > threshold {
        collect_below(node.left(), threshold, out);
    } else {
        collect_below(node.left(), threshold, out);
        out.push(node.value().node_id.clone());
        collect_below(node.right(), threshold, out);
    }
}
