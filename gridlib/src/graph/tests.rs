use super::*;

/// producer p (200), consumers c1 (90/100) and c2 (10/100), substation s.
fn small_network() -> ElectricalNetworkGraph {
    let mut graph = ElectricalNetworkGraph::new();
    graph
        .add_node(NodeSpec::new(NodeType::Producer, 200.0, 0.0).with_id("p"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 90.0).with_id("c1"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 10.0).with_id("c2"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(NodeType::Substation, 300.0, 100.0).with_id("s"))
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("p", "s", 0.5, 100.0).with_flow(4.0))
        .unwrap();
    graph
        .add_edge(EdgeSpec::new("s", "c1", 1.0, 100.0).with_flow(-2.0))
        .unwrap();
    graph.add_edge(EdgeSpec::new("s", "c2", 0.0, 0.0)).unwrap();
    graph
}

fn ids(nodes: &[NetworkNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.id.as_str()).collect()
}

#[test]
fn parse_snapshot() {
    let data = r#"
        {
            "nodes": [
                { "id": "a", "type": "producer", "capacity": 100, "demand": 0, "status": "active", "name": "Plant" },
                { "id": "b", "type": "consumer", "capacity": 50, "demand": 20 },
                { "id": "c", "type": "transmission", "capacity": 80, "demand": 0, "status": "maintenance" }
            ],
            "edges": [
                { "id": "edge-1", "origin": "a", "destination": "b", "resistance": 0.1, "capacity": 100, "currentFlow": 20 },
                { "id": "edge-2", "origin": "a", "destination": "c", "resistance": 0.2, "capacity": 100 }
            ],
            "edgeIdCounter": 3
        }"#;

    let snapshot: NetworkSnapshot = serde_json::from_str(data).unwrap();
    assert_eq!(snapshot.nodes.len(), 3);
    assert_eq!(snapshot.nodes[0].name.as_deref(), Some("Plant"));
    assert_eq!(snapshot.nodes[1].status, NodeStatus::Active);
    assert_eq!(snapshot.nodes[2].node_type, NodeType::Transmission);
    assert_eq!(snapshot.edges[1].current_flow, 0.0);

    let graph = ElectricalNetworkGraph::from_snapshot(snapshot.clone()).unwrap();
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.get_edge_id_counter(), 3);
    assert_eq!(graph.snapshot(), snapshot);
}

#[test]
fn serialized_names() {
    let node = NetworkNode {
        id: "n".into(),
        node_type: NodeType::Substation,
        capacity: 1.0,
        demand: 0.5,
        status: NodeStatus::Inactive,
        name: None,
    };
    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "id": "n", "type": "substation", "capacity": 1.0, "demand": 0.5, "status": "inactive"
        })
    );
}

#[test]
fn add_node_validation() {
    let mut graph = ElectricalNetworkGraph::new();
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 10.0, 1.0).with_id("a"))
        .unwrap();
    assert!(matches!(
        graph.add_node(NodeSpec::new(NodeType::Consumer, 10.0, 1.0).with_id("a")),
        Err(GridError::DuplicateNode(id)) if id == "a"
    ));
    assert!(matches!(
        graph.add_node(NodeSpec::new(NodeType::Consumer, -1.0, 1.0)),
        Err(GridError::InvalidValue {
            field: "capacity",
            ..
        })
    ));
    assert!(graph
        .add_node(NodeSpec::new(NodeType::Consumer, 1.0, f64::NAN))
        .is_err());
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn generated_ids() {
    let mut graph = ElectricalNetworkGraph::new();
    let a = graph
        .add_node(NodeSpec::new(NodeType::Consumer, 10.0, 1.0))
        .unwrap();
    let b = graph
        .add_node(NodeSpec::new(NodeType::Consumer, 10.0, 1.0).with_id(""))
        .unwrap();
    assert!(a.id.starts_with("node-"));
    assert_ne!(a.id, b.id);
    assert_eq!(a.status, NodeStatus::Active);

    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 10.0, 1.0).with_id("c"))
        .unwrap();
    let e1 = graph.add_edge(EdgeSpec::new(&a.id, &b.id, 1.0, 1.0)).unwrap();
    assert_eq!(e1.id, "edge-1");
    // A manually named edge takes the next counter value.
    graph
        .add_edge(EdgeSpec::new(&a.id, "c", 1.0, 1.0).with_id("edge-2"))
        .unwrap();
    let e3 = graph.add_edge(EdgeSpec::new(&b.id, "c", 1.0, 1.0)).unwrap();
    assert_eq!(e3.id, "edge-3");
    assert_eq!(graph.get_edge_id_counter(), 4);

    // Ids are never reused after deletion.
    assert!(graph.remove_edge("edge-3"));
    let e4 = graph.add_edge(EdgeSpec::new(&b.id, "c", 1.0, 1.0)).unwrap();
    assert_eq!(e4.id, "edge-4");
}

#[test]
fn add_edge_validation() {
    let mut graph = small_network();
    assert!(matches!(
        graph.add_edge(EdgeSpec::new("p", "missing", 1.0, 1.0)),
        Err(GridError::NodeNotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        graph.add_edge(EdgeSpec::new("p", "p", 1.0, 1.0)),
        Err(GridError::SelfLoop(_))
    ));
    // Parallel in either direction
    assert!(matches!(
        graph.add_edge(EdgeSpec::new("s", "p", 1.0, 1.0)),
        Err(GridError::ParallelEdge { .. })
    ));
    assert!(matches!(
        graph.add_edge(EdgeSpec::new("p", "c1", 1.0, 1.0).with_id("edge-1")),
        Err(GridError::DuplicateEdge(_))
    ));
    assert!(matches!(
        graph.add_edge(EdgeSpec::new("p", "c1", -0.1, 1.0)),
        Err(GridError::InvalidValue {
            field: "resistance",
            ..
        })
    ));
    assert_eq!(graph.edge_count(), 3);
    graph.add_edge(EdgeSpec::new("p", "c1", 1.0, 1.0)).unwrap();
    assert_eq!(graph.edge_count(), 4);
}

#[test]
fn remove_node_cascades() {
    let mut graph = small_network();
    assert_eq!(graph.get_edges_by_node("s").len(), 3);
    assert!(graph.remove_node("s"));
    assert!(!graph.remove_node("s"));
    assert_eq!(graph.edge_count(), 0);
    for edge in graph.get_all_edges() {
        assert!(graph.get_node(&edge.origin).is_some());
        assert!(graph.get_node(&edge.destination).is_some());
    }
    assert!(!graph.remove_edge("edge-1"));
}

#[test]
fn update_node() {
    let mut graph = small_network();
    graph.update_node("c2", NodeUpdate::demand(50.0)).unwrap();
    assert_eq!(graph.get_node("c2").unwrap().demand, 50.0);
    graph
        .update_node(
            "c2",
            NodeUpdate {
                name: Some("Mall".into()),
                node_type: Some(NodeType::Transmission),
                ..Default::default()
            },
        )
        .unwrap();
    let node = graph.get_node("c2").unwrap();
    assert_eq!(node.name.as_deref(), Some("Mall"));
    assert_eq!(node.node_type, NodeType::Transmission);
    assert_eq!(node.demand, 50.0);

    assert!(matches!(
        graph.update_node("zz", NodeUpdate::demand(1.0)),
        Err(GridError::NodeNotFound(_))
    ));
    assert!(graph.update_node("c2", NodeUpdate::capacity(-5.0)).is_err());
    assert_eq!(graph.get_node("c2").unwrap().capacity, 100.0);
}

#[test]
fn update_edge() {
    let mut graph = small_network();
    graph
        .update_edge("edge-1", EdgeUpdate::current_flow(-7.0))
        .unwrap();
    assert_eq!(graph.get_edge("edge-1").unwrap().current_flow, -7.0);

    // Moving an endpoint is validated like a new edge.
    let to_missing = EdgeUpdate {
        destination: Some("nope".into()),
        ..Default::default()
    };
    assert!(matches!(
        graph.update_edge("edge-1", to_missing),
        Err(GridError::NodeNotFound(_))
    ));
    let to_parallel = EdgeUpdate {
        destination: Some("c1".into()),
        ..Default::default()
    };
    assert!(matches!(
        graph.update_edge("edge-3", to_parallel),
        Err(GridError::ParallelEdge { .. })
    ));
    let to_self = EdgeUpdate {
        destination: Some("p".into()),
        ..Default::default()
    };
    assert!(matches!(
        graph.update_edge("edge-1", to_self),
        Err(GridError::SelfLoop(_))
    ));
    // Reversing an edge does not conflict with itself.
    let reversed = EdgeUpdate {
        origin: Some("s".into()),
        destination: Some("p".into()),
        ..Default::default()
    };
    graph.update_edge("edge-1", reversed).unwrap();
    assert_eq!(graph.get_edge("edge-1").unwrap().origin, "s");

    assert!(matches!(
        graph.update_edge("edge-9", EdgeUpdate::capacity(1.0)),
        Err(GridError::EdgeNotFound(_))
    ));
}

#[test]
fn metrics() {
    let mut graph = small_network();
    // 4² × 0.5 + (-2)² × 1 + 0
    assert_eq!(graph.compute_losses(), 12.0);
    // (200 - 12) / 200
    assert!((graph.compute_efficiency() - 94.0).abs() < 1e-9);
    assert_eq!(graph.compute_consumption(), 100.0);

    graph
        .update_node("c1", NodeUpdate::status(NodeStatus::Maintenance))
        .unwrap();
    assert_eq!(graph.compute_consumption(), 10.0);

    // Losses above production clamp to 0
    graph
        .update_edge("edge-1", EdgeUpdate::current_flow(100.0))
        .unwrap();
    assert_eq!(graph.compute_efficiency(), 0.0);

    // No production
    graph
        .update_node("p", NodeUpdate::status(NodeStatus::Inactive))
        .unwrap();
    assert_eq!(graph.compute_efficiency(), 0.0);
    assert!(graph.compute_losses() >= 0.0);
}

#[test]
fn stats() {
    let mut graph = small_network();
    graph
        .update_node("c2", NodeUpdate::status(NodeStatus::Maintenance))
        .unwrap();
    let stats = graph.get_stats();
    assert_eq!(stats.total_nodes, 4);
    assert_eq!(stats.total_edges, 3);
    assert_eq!(
        stats.nodes_by_type,
        NodeTypeCounts {
            producer: 1,
            consumer: 2,
            substation: 1,
            transmission: 0,
        }
    );
    assert_eq!(stats.active_nodes, 3);
    assert_eq!(stats.inactive_nodes, 1);
    assert_eq!(stats.total_consumption, 90.0);
    assert_eq!(graph.get_stats(), stats);
}

#[test]
fn utilization_queries() {
    let mut graph = small_network();
    // p 0.0, c1 0.9, c2 0.1, s 0.333
    assert_eq!(ids(&graph.find_nodes_above_utilization(0.9)), vec!["c1"]);
    assert_eq!(
        ids(&graph.find_nodes_below_utilization(0.9)),
        vec!["p", "c2", "s", "c1"]
    );
    assert_eq!(
        ids(&graph.find_nodes_below_utilization(0.2)),
        vec!["p", "c2"]
    );
    assert!(graph.find_nodes_above_utilization(1.5).is_empty());

    graph.update_node("c2", NodeUpdate::demand(95.0)).unwrap();
    assert_eq!(ids(&graph.find_nodes_above_utilization(0.9)), vec!["c1", "c2"]);

    graph
        .update_node("c1", NodeUpdate::status(NodeStatus::Inactive))
        .unwrap();
    assert_eq!(ids(&graph.find_nodes_above_utilization(0.9)), vec!["c2"]);
    assert_eq!(graph.load_index().len(), 3);
}

#[test]
fn equal_utilization_is_not_evicted() {
    let mut graph = ElectricalNetworkGraph::new();
    for id in ["a", "b", "c"] {
        graph
            .add_node(NodeSpec::new(NodeType::Consumer, 100.0, 95.0).with_id(id))
            .unwrap();
    }
    // Rounds to the same scaled key as the others.
    graph
        .add_node(NodeSpec::new(NodeType::Consumer, 1000.0, 950.00001).with_id("d"))
        .unwrap();
    assert_eq!(graph.load_index().len(), 4);
    assert_eq!(
        ids(&graph.find_nodes_above_utilization(0.9)),
        vec!["a", "b", "c", "d"]
    );
}

#[test]
fn restore_is_atomic() {
    let mut graph = small_network();
    let before = graph.snapshot();
    let bad_edges = vec![NetworkEdge {
        id: "x".into(),
        origin: "p".into(),
        destination: "ghost".into(),
        ..Default::default()
    }];
    assert!(graph
        .restore(before.nodes.clone(), bad_edges, 10)
        .is_err());
    assert_eq!(graph.snapshot(), before);

    graph.restore(before.nodes.clone(), Vec::new(), 10).unwrap();
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.get_edge_id_counter(), 10);

    graph.clear();
    assert_eq!(graph.node_count(), 0);
    assert_eq!(graph.get_edge_id_counter(), 1);
}
