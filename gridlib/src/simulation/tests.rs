use super::*;
use crate::graph::{EdgeSpec, NodeSpec};
use crate::GridError;

fn network() -> ElectricalNetworkGraph {
    let mut graph = ElectricalNetworkGraph::new();
    graph
        .add_node(NodeSpec::new(NodeType::Producer, 500.0, 0.0).with_id("plant"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 40.0).with_id("home"))
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("plant", "home", 0.1, 200.0).with_id("line").with_flow(40.0))
        .unwrap();
    graph
}

fn event(kind: EventKind) -> Event {
    Event::new(kind, 2).unwrap()
}

fn apply(graph: &mut ElectricalNetworkGraph, kind: EventKind) -> (Result<()>, Vec<SimulationLog>) {
    let mut logs = LogBook::default();
    let result = apply_event(graph, &event(kind), &Config::default(), &mut logs);
    (result, logs.into_entries())
}

fn levels(logs: &[SimulationLog]) -> Vec<LogLevel> {
    logs.iter().map(|l| l.level).collect()
}

#[test]
fn demand_change() {
    let mut graph = network();
    let (result, logs) = apply(
        &mut graph,
        EventKind::DemandChange {
            node_id: "home".into(),
            demand: 75.0,
        },
    );
    assert!(result.is_ok());
    assert_eq!(graph.get_node("home").unwrap().demand, 75.0);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Info);
    assert_eq!(logs[0].message, "Demand of node home changed from 40 to 75");
}

#[test]
fn missing_targets_are_warnings() {
    let mut graph = network();
    let before = graph.snapshot();
    let kinds = vec![
        EventKind::DemandChange {
            node_id: "ghost".into(),
            demand: 1.0,
        },
        EventKind::NodeFailure {
            node_id: "ghost".into(),
        },
        EventKind::NodeRecovery {
            node_id: "ghost".into(),
        },
        EventKind::Overload {
            target: Target::Edge("ghost".into()),
            multiplier: None,
        },
        EventKind::CapacityChange {
            target: Target::Node("ghost".into()),
            capacity: 3.0,
        },
    ];
    for kind in kinds {
        let (result, logs) = apply(&mut graph, kind);
        assert!(result.is_ok());
        assert_eq!(levels(&logs), vec![LogLevel::Warning]);
        assert!(logs[0].message.contains("ghost"));
    }
    assert_eq!(graph.snapshot(), before);
}

#[test]
fn invalid_value_is_an_error() {
    let mut graph = network();
    let (result, logs) = apply(
        &mut graph,
        EventKind::DemandChange {
            node_id: "home".into(),
            demand: -5.0,
        },
    );
    assert!(matches!(
        result,
        Err(GridError::InvalidValue {
            field: "demand",
            ..
        })
    ));
    assert!(logs.is_empty());
    assert_eq!(graph.get_node("home").unwrap().demand, 40.0);
}

#[test]
fn failure_and_recovery() {
    let mut graph = network();
    let (_, logs) = apply(
        &mut graph,
        EventKind::NodeFailure {
            node_id: "home".into(),
        },
    );
    assert_eq!(graph.get_node("home").unwrap().status, NodeStatus::Inactive);
    assert_eq!(levels(&logs), vec![LogLevel::Error]);

    let (_, logs) = apply(
        &mut graph,
        EventKind::NodeRecovery {
            node_id: "home".into(),
        },
    );
    assert_eq!(graph.get_node("home").unwrap().status, NodeStatus::Active);
    assert_eq!(levels(&logs), vec![LogLevel::Success]);
}

#[test]
fn overload_multipliers() {
    let mut graph = network();
    let (_, logs) = apply(
        &mut graph,
        EventKind::Overload {
            target: Target::Node("home".into()),
            multiplier: None,
        },
    );
    assert_eq!(graph.get_node("home").unwrap().demand, 60.0);
    assert_eq!(logs[0].message, "Node home overloaded: demand increased to 60.00");
    assert_eq!(logs[0].level, LogLevel::Warning);

    let (_, logs) = apply(
        &mut graph,
        EventKind::Overload {
            target: Target::Edge("line".into()),
            multiplier: Some(2.0),
        },
    );
    assert_eq!(graph.get_edge("line").unwrap().current_flow, 80.0);
    assert_eq!(logs[0].message, "Edge line overloaded: flow increased to 80.00");
}

#[test]
fn capacity_changes() {
    let mut graph = network();
    let (result, logs) = apply(
        &mut graph,
        EventKind::CapacityChange {
            target: Target::Node("home".into()),
            capacity: 120.0,
        },
    );
    assert!(result.is_ok());
    assert_eq!(levels(&logs), vec![LogLevel::Info]);
    let (_, logs) = apply(
        &mut graph,
        EventKind::CapacityChange {
            target: Target::Edge("line".into()),
            capacity: 50.0,
        },
    );
    assert_eq!(graph.get_node("home").unwrap().capacity, 120.0);
    assert_eq!(graph.get_edge("line").unwrap().capacity, 50.0);
    assert_eq!(logs[0].message, "Capacity of edge line changed from 200 to 50");
}

#[test]
fn unknown_and_alert_events_change_nothing() {
    let mut graph = network();
    let before = graph.snapshot();
    let (_, logs) = apply(
        &mut graph,
        EventKind::Unknown {
            type_name: "solar_flare".into(),
            payload: Default::default(),
        },
    );
    assert_eq!(logs[0].message, "Unknown event type: solar_flare");

    let (_, logs) = apply(
        &mut graph,
        EventKind::CriticalNodeFailure {
            inactive_count: 1,
            inactive_nodes: vec!["home".into()],
        },
    );
    assert_eq!(levels(&logs), vec![LogLevel::Warning]);
    assert_eq!(graph.snapshot(), before);
}

#[test]
fn critical_overloads() {
    let mut graph = network();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 92.0).with_id("warm"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 97.0).with_id("hot"))
        .unwrap();
    graph
        .add_node(
            NodeSpec::new(NodeType::Consumer, 100.0, 99.0)
                .with_id("off")
                .with_status(NodeStatus::Maintenance),
        )
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("plant", "hot", 0.1, 100.0).with_id("busy").with_flow(-96.0))
        .unwrap();

    let mut heap = MinHeap::new();
    let mut logs = LogBook::default();
    check_critical_conditions(&graph, &mut heap, &Config::default(), &mut logs);

    let messages: Vec<&str> = logs.entries().iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Critical condition detected: node hot at 97.0% utilization",
            "Critical condition detected: node warm at 92.0% utilization",
            "Critical condition detected: edge busy at 96.0% utilization",
        ]
    );
    assert_eq!(
        levels(logs.entries()),
        vec![LogLevel::Error, LogLevel::Warning, LogLevel::Error]
    );

    assert_eq!(heap.size(), 3);
    let first = heap.extract_min().unwrap();
    assert_eq!(first.severity, 0);
    let second = heap.extract_min().unwrap();
    assert_eq!(second.severity, 0);
    let third = heap.extract_min().unwrap();
    assert_eq!(third.severity, 1);
    assert_eq!(
        third.kind,
        EventKind::CriticalOverload {
            node_id: "warm".into(),
            utilization: 0.92,
            demand: 92.0,
            capacity: 100.0,
        }
    );
}

#[test]
fn inactive_nodes_are_reported_once() {
    let mut graph = ElectricalNetworkGraph::new();
    for i in 0..4 {
        graph
            .add_node(
                NodeSpec::new(NodeType::Consumer, 10.0, 1.0)
                    .with_id(format!("n{}", i))
                    .with_status(NodeStatus::Inactive),
            )
            .unwrap();
    }

    let mut heap = MinHeap::new();
    let mut logs = LogBook::default();
    check_critical_conditions(&graph, &mut heap, &Config::default(), &mut logs);
    assert_eq!(heap.size(), 1);
    assert_eq!(levels(logs.entries()), vec![LogLevel::Error]);
    assert_eq!(logs.entries()[0].message, "4 inactive node(s) in the network");
    let alert = heap.extract_min().unwrap();
    assert_eq!(alert.severity, 0);
    assert_eq!(alert.type_name(), "critical_node_failure");

    graph.remove_node("n3");
    let mut logs = LogBook::default();
    check_critical_conditions(&graph, &mut heap, &Config::default(), &mut logs);
    assert_eq!(levels(logs.entries()), vec![LogLevel::Warning]);
    assert_eq!(heap.extract_min().unwrap().severity, 2);
}

#[test]
fn log_levels_serialize_lowercase() {
    let json = serde_json::to_string(&LogLevel::Success).unwrap();
    assert_eq!(json, r#""success""#);
}
