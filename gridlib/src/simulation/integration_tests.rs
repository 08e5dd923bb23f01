//! Integration tests
//!
//! Whole cycles on small networks, from queued event to reported metrics.

use super::*;
use crate::graph::{EdgeSpec, NodeSpec};

fn consumer(graph: &mut ElectricalNetworkGraph, id: &str, capacity: f64, demand: f64) {
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, capacity, demand).with_id(id))
        .unwrap();
}

/// Producer feeding a hot and a cold consumer.
fn feeder() -> ElectricalNetworkGraph {
    let mut graph = ElectricalNetworkGraph::new();
    graph
        .add_node(NodeSpec::new(NodeType::Producer, 400.0, 0.0).with_id("plant"))
        .unwrap();
    consumer(&mut graph, "hot", 100.0, 80.0);
    consumer(&mut graph, "cold", 100.0, 10.0);
    graph
        .add_edge(EdgeSpec::new("plant", "hot", 0.01, 150.0).with_flow(80.0))
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("plant", "cold", 0.01, 150.0).with_flow(10.0))
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("hot", "cold", 0.01, 150.0))
        .unwrap();
    graph
}

fn messages(result: &SimulationResult) -> Vec<&str> {
    result.logs.iter().map(|l| l.message.as_str()).collect()
}

#[test]
fn quiet_cycle_changes_nothing() {
    let mut graph = feeder();
    let before = Metrics::of(&graph);
    let snapshot = graph.snapshot();
    let mut fifo = FifoQueue::new();
    let mut heap = MinHeap::new();

    let result = run_simulation_cycle(&mut graph, &mut fifo, &mut heap);
    assert!(result.logs.iter().all(|l| l.level == LogLevel::Info));
    assert_eq!(result.metrics, before);
    assert_eq!(graph.snapshot(), snapshot);
    assert_eq!(result.pending_events, PendingEvents { fifo: 0, heap: 0 });
    assert_eq!(
        messages(&result),
        vec![
            "No events in the FIFO queue to process",
            "Metrics recalculated: losses=65.00, efficiency=83.75%, consumption=90.00",
        ]
    );
}

#[test]
fn overload_triggers_balancing() {
    let mut graph = feeder();
    let mut fifo = FifoQueue::new();
    let mut heap = MinHeap::new();
    fifo.enqueue(
        Event::new(
            EventKind::Overload {
                target: Target::Node("hot".into()),
                multiplier: Some(1.25),
            },
            1,
        )
        .unwrap(),
    );
    fifo.enqueue(
        Event::new(
            EventKind::NodeRecovery {
                node_id: "cold".into(),
            },
            3,
        )
        .unwrap(),
    );

    let result = run_simulation_cycle(&mut graph, &mut fifo, &mut heap);
    assert_eq!(
        messages(&result),
        vec![
            "Processing event: overload",
            "Node hot overloaded: demand increased to 100.00",
            "Critical condition detected: node hot at 100.0% utilization",
            "Automatic load balancing: 1 transfers performed",
            "  -> Balancing complete: 1 transfers performed. Efficiency gain: 0.00%",
            "  -> Redistributed 10.00 from hot to plant via 1 hops",
            "Metrics recalculated: losses=65.00, efficiency=83.75%, consumption=100.00",
        ]
    );
    assert_eq!(result.logs[2].level, LogLevel::Error);
    assert_eq!(result.logs[3].level, LogLevel::Success);

    // The idle producer is the least utilized candidate.
    assert_eq!(graph.get_node("hot").unwrap().demand, 90.0);
    assert_eq!(graph.get_node("plant").unwrap().demand, 10.0);
    assert_eq!(graph.get_node("cold").unwrap().demand, 10.0);
    assert_eq!(result.pending_events, PendingEvents { fifo: 1, heap: 1 });
    let alert = heap.peek().unwrap();
    assert_eq!(alert.severity, 0);
    assert_eq!(alert.type_name(), "critical_overload");

    let hot = result.graph.nodes.iter().find(|n| n.id == "hot").unwrap();
    assert_eq!(hot.demand, 90.0);
    assert_eq!(result.graph.edges.len(), 3);
}

#[test]
fn failures_escalate() {
    let mut graph = ElectricalNetworkGraph::new();
    for id in ["a", "b", "c", "d", "e"] {
        consumer(&mut graph, id, 50.0, 10.0);
    }
    let mut fifo = FifoQueue::new();
    let mut heap = MinHeap::new();
    for id in ["a", "b", "c", "d"] {
        fifo.enqueue(
            Event::new(
                EventKind::NodeFailure {
                    node_id: id.into(),
                },
                1,
            )
            .unwrap(),
        );
    }

    for cycle in 1..=4 {
        let result = run_simulation_cycle(&mut graph, &mut fifo, &mut heap);
        let report = result
            .logs
            .iter()
            .find(|l| l.message.ends_with("inactive node(s) in the network"))
            .unwrap();
        assert_eq!(
            report.message,
            format!("{} inactive node(s) in the network", cycle)
        );
        let expected = if cycle > 3 {
            LogLevel::Error
        } else {
            LogLevel::Warning
        };
        assert_eq!(report.level, expected);
        assert_eq!(
            result.logs.iter().rev().nth(1).unwrap().message,
            "Automatic load balancing made no transfers: No overloaded nodes found"
        );
        assert_eq!(result.metrics.consumption, 10.0 * (5 - cycle) as f64);
    }
    assert!(fifo.is_empty());
    assert_eq!(heap.size(), 4);
    assert_eq!(heap.extract_min().unwrap().severity, 0);
}

#[test]
fn rejected_event_is_logged() {
    let mut graph = feeder();
    let mut fifo = FifoQueue::new();
    let mut heap = MinHeap::new();
    fifo.enqueue(
        Event::new(
            EventKind::CapacityChange {
                target: Target::Edge("edge-1".into()),
                capacity: f64::NAN,
            },
            2,
        )
        .unwrap(),
    );

    let result = run_simulation_cycle(&mut graph, &mut fifo, &mut heap);
    assert_eq!(result.logs[1].level, LogLevel::Error);
    assert!(result.logs[1]
        .message
        .starts_with("Error applying event capacity_change: "));
    assert_eq!(graph.get_edge("edge-1").unwrap().capacity, 150.0);
}

#[test]
fn custom_thresholds() {
    let mut graph = feeder();
    let config = Config {
        overload_threshold: 0.75,
        critical_threshold: 0.85,
        ..Config::default()
    };
    let mut fifo = FifoQueue::new();
    let mut heap = MinHeap::new();

    let result = run_simulation_cycle_with(&mut graph, &mut fifo, &mut heap, &config);
    assert_eq!(
        result.logs[1].message,
        "Critical condition detected: node hot at 80.0% utilization"
    );
    assert_eq!(result.logs[1].level, LogLevel::Warning);
    assert_eq!(heap.peek().unwrap().severity, 1);
    // Excess over 75 is 5.
    assert_eq!(graph.get_node("hot").unwrap().demand, 75.0);
    assert_eq!(graph.get_node("plant").unwrap().demand, 5.0);
}

#[test]
fn result_wire_format() {
    let mut graph = feeder();
    let result = run_simulation_cycle(&mut graph, &mut FifoQueue::new(), &mut MinHeap::new());
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["pendingEvents"]["fifo"], 0);
    assert_eq!(json["logs"][0]["level"], "info");
    assert!(json["logs"][0]["timestamp"].is_string());
    let node = &json["graph"]["nodes"][0];
    assert_eq!(node["id"], "cold");
    assert_eq!(node["type"], "consumer");
    assert!(node.get("name").is_none());
    assert_eq!(json["graph"]["edges"][0]["currentFlow"], 80.0);
    assert_eq!(json["metrics"]["consumption"], 90.0);
}
