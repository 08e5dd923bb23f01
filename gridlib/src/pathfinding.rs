//! Shortest paths over the undirected, resistance-weighted network.
use crate::graph::ElectricalNetworkGraph;
use crate::utils::parse_int_prefix;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Result of a path search.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ShortestPath {
    /// Node ids from start to end, empty if the end is unreachable.
    pub path: Vec<String>,
    /// Sum of the edge weights along `path`, infinite if unreachable.
    pub distance: f64,
    /// Number of primitive steps performed.
    pub operations: u64,
}

impl ShortestPath {
    fn unreachable(operations: u64) -> Self {
        ShortestPath {
            path: Vec::new(),
            distance: f64::INFINITY,
            operations,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty() && self.distance.is_finite()
    }

    /// Number of edges on the path.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Strategy used to find a path between two nodes.
pub trait PathFinder {
    fn find_path(&self, graph: &ElectricalNetworkGraph, start: &str, end: &str) -> ShortestPath;
}

type Adjacency<'a> = BTreeMap<&'a str, Vec<(&'a str, f64)>>;

fn adjacency<'a>(graph: &'a ElectricalNetworkGraph, operations: &mut u64) -> Adjacency<'a> {
    let mut adjacency: Adjacency = graph.nodes().map(|n| (n.id.as_str(), Vec::new())).collect();
    *operations += adjacency.len() as u64;
    for edge in graph.edges() {
        let weight = edge.weight();
        if let Some(list) = adjacency.get_mut(edge.origin.as_str()) {
            list.push((edge.destination.as_str(), weight));
        }
        if let Some(list) = adjacency.get_mut(edge.destination.as_str()) {
            list.push((edge.origin.as_str(), weight));
        }
        *operations += 2;
    }
    adjacency
}

/// Follows `previous` links back from `end`.
fn reconstruct(previous: &BTreeMap<&str, &str>, end: &str, operations: &mut u64) -> Vec<String> {
    let mut path = vec![end.to_string()];
    let mut current = end;
    while let Some(&prev) = previous.get(current) {
        path.push(prev.to_string());
        current = prev;
        *operations += 1;
    }
    path.reverse();
    path
}

/// Dijkstra's algorithm picking the closest unvisited node by linear scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dijkstra;

impl PathFinder for Dijkstra {
    fn find_path(&self, graph: &ElectricalNetworkGraph, start: &str, end: &str) -> ShortestPath {
        if graph.get_node(start).is_none() || graph.get_node(end).is_none() {
            return ShortestPath::unreachable(1);
        }
        let mut operations = 0;
        let adjacency = adjacency(graph, &mut operations);

        let mut distances: BTreeMap<&str, f64> = BTreeMap::new();
        let mut previous: BTreeMap<&str, &str> = BTreeMap::new();
        let mut unvisited: BTreeSet<&str> = adjacency.keys().copied().collect();
        operations += unvisited.len() as u64;
        if let Some((&start, _)) = adjacency.get_key_value(start) {
            distances.insert(start, 0.0);
        }

        while !unvisited.is_empty() {
            operations += 1;
            let mut closest: Option<(&str, f64)> = None;
            for &id in &unvisited {
                operations += 1;
                let distance = distances.get(id).copied().unwrap_or(f64::INFINITY);
                if distance < closest.map_or(f64::INFINITY, |(_, d)| d) {
                    closest = Some((id, distance));
                }
            }
            let (current, distance) = match closest {
                Some(closest) => closest,
                // Remaining nodes are unreachable
                None => break,
            };
            unvisited.remove(current);
            operations += 1;
            if current == end {
                break;
            }

            for &(neighbor, weight) in adjacency.get(current).into_iter().flatten() {
                operations += 1;
                if !unvisited.contains(neighbor) {
                    continue;
                }
                let alt = distance + weight;
                if alt < distances.get(neighbor).copied().unwrap_or(f64::INFINITY) {
                    distances.insert(neighbor, alt);
                    previous.insert(neighbor, current);
                    operations += 2;
                }
            }
        }

        match distances.get(end) {
            Some(&distance) => ShortestPath {
                path: reconstruct(&previous, end, &mut operations),
                distance,
                operations,
            },
            None => ShortestPath::unreachable(operations),
        }
    }
}

/// Estimate of the remaining distance used by [`AStar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heuristic {
    /// Absolute difference of the leading integers of the two ids, or 1 if either id has none
    /// or the difference is 0. Not admissible in general, so paths may be suboptimal.
    #[default]
    NumericId,
    /// Always 0. A* then returns the same distances as Dijkstra.
    Zero,
}

impl Heuristic {
    pub fn estimate(&self, from: &str, to: &str) -> f64 {
        match self {
            Heuristic::NumericId => match (parse_int_prefix(from), parse_int_prefix(to)) {
                (Some(a), Some(b)) if a != b => a.abs_diff(b) as f64,
                _ => 1.0,
            },
            Heuristic::Zero => 0.0,
        }
    }
}

/// A* search with open and closed sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct AStar {
    pub heuristic: Heuristic,
}

impl AStar {
    pub fn new(heuristic: Heuristic) -> Self {
        AStar { heuristic }
    }
}

impl PathFinder for AStar {
    fn find_path(&self, graph: &ElectricalNetworkGraph, start: &str, end: &str) -> ShortestPath {
        let (start, end) = match (graph.get_node(start), graph.get_node(end)) {
            (Some(s), Some(e)) => (s.id.as_str(), e.id.as_str()),
            _ => return ShortestPath::unreachable(1),
        };
        let mut operations = 0;
        let estimate = |from: &str, operations: &mut u64| {
            *operations += 1;
            self.heuristic.estimate(from, end)
        };
        let adjacency = adjacency(graph, &mut operations);

        let mut open: BTreeSet<&str> = BTreeSet::from([start]);
        let mut closed: BTreeSet<&str> = BTreeSet::new();
        let mut g_score: BTreeMap<&str, f64> = BTreeMap::from([(start, 0.0)]);
        let mut f_score: BTreeMap<&str, f64> =
            BTreeMap::from([(start, estimate(start, &mut operations))]);
        let mut came_from: BTreeMap<&str, &str> = BTreeMap::new();
        operations += 2;

        loop {
            operations += 1;
            let mut best: Option<(&str, f64)> = None;
            for &id in &open {
                operations += 1;
                let f = f_score.get(id).copied().unwrap_or(f64::INFINITY);
                if best.map_or(true, |(_, b)| f < b) {
                    best = Some((id, f));
                }
            }
            let current = match best {
                Some((current, _)) => current,
                None => return ShortestPath::unreachable(operations),
            };

            if current == end {
                let distance = g_score.get(end).copied().unwrap_or(f64::INFINITY);
                return ShortestPath {
                    path: reconstruct(&came_from, end, &mut operations),
                    distance,
                    operations,
                };
            }

            open.remove(current);
            closed.insert(current);
            operations += 2;

            let current_g = g_score.get(current).copied().unwrap_or(f64::INFINITY);
            for &(neighbor, weight) in adjacency.get(current).into_iter().flatten() {
                operations += 1;
                if closed.contains(neighbor) {
                    continue;
                }
                let tentative = current_g + weight;
                if open.insert(neighbor) {
                    operations += 1;
                } else if tentative >= g_score.get(neighbor).copied().unwrap_or(f64::INFINITY) {
                    continue;
                }
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative);
                f_score.insert(neighbor, tentative + estimate(neighbor, &mut operations));
                operations += 3;
            }
        }
    }
}

/// Shortest path with [`Dijkstra`].
pub fn dijkstra(graph: &ElectricalNetworkGraph, start: &str, end: &str) -> ShortestPath {
    Dijkstra.find_path(graph, start, end)
}

/// Path with [`AStar`] and the default heuristic.
pub fn a_star(graph: &ElectricalNetworkGraph, start: &str, end: &str) -> ShortestPath {
    AStar::default().find_path(graph, start, end)
}
