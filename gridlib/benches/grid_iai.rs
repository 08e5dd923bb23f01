use gridlib::bptree::BPlusTree;
use gridlib::events::{Event, EventKind, Target};
use gridlib::graph::{EdgeSpec, ElectricalNetworkGraph, NodeSpec, NodeType};
use gridlib::queue::{FifoQueue, MinHeap};
use gridlib::simulation::run_simulation_cycle;
use iai_callgrind::{black_box, library_benchmark, library_benchmark_group, main};

/// Pseudo-random timestamps, so that inserts do not only append to the last leaf.
fn timestamps(count: i64) -> Vec<i64> {
    (0..count).map(|i| (i * 7919) % count * 1000).collect()
}

/// A ring of substations, each feeding one consumer, with a single producer.
fn ring_network(size: usize) -> ElectricalNetworkGraph {
    let mut graph = ElectricalNetworkGraph::new();
    graph
        .add_node(NodeSpec::new(NodeType::Producer, 10_000.0, 0.0).with_id("0-plant"))
        .unwrap();
    for i in 0..size {
        let substation = NodeSpec::new(NodeType::Substation, 500.0, 100.0);
        graph.add_node(substation.with_id(format!("{i}-sub"))).unwrap();
        let demand = if i % 5 == 0 { 98.0 } else { 30.0 };
        let consumer = NodeSpec::new(NodeType::Consumer, 100.0, demand);
        graph.add_node(consumer.with_id(format!("{i}-load"))).unwrap();

        let feeder = EdgeSpec::new(format!("{i}-sub"), format!("{i}-load"), 0.2, 150.0);
        graph.add_edge(feeder.with_flow(demand)).unwrap();
        let next = format!("{}-sub", (i + 1) % size);
        graph
            .add_edge(EdgeSpec::new(format!("{i}-sub"), next, 0.5, 400.0))
            .unwrap();
    }
    graph
        .add_edge(EdgeSpec::new("0-plant", "0-sub", 0.1, 5_000.0))
        .unwrap();
    graph
}

fn setup_cycle(size: usize) -> (ElectricalNetworkGraph, FifoQueue, MinHeap) {
    let graph = ring_network(size);
    let mut fifo = FifoQueue::new();
    fifo.enqueue(
        Event::new(
            EventKind::Overload {
                target: Target::Node("1-load".into()),
                multiplier: Some(3.0),
            },
            1,
        )
        .unwrap(),
    );
    (graph, fifo, MinHeap::new())
}

#[library_benchmark]
#[bench::thousand(timestamps(1_000))]
#[bench::ten_thousand(timestamps(10_000))]
fn bptree_ingest(keys: Vec<i64>) {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in keys {
        tree.insert(key, key as f64);
    }
    black_box(tree.range_query(0, i64::MAX).len());
}

#[library_benchmark]
#[bench::ring_20(setup_cycle(20))]
#[bench::ring_200(setup_cycle(200))]
fn simulation_cycle(input: (ElectricalNetworkGraph, FifoQueue, MinHeap)) {
    let (mut graph, mut fifo, mut heap) = input;
    let result = run_simulation_cycle(&mut graph, &mut fifo, &mut heap);
    black_box(result);
}

library_benchmark_group!(
    name = engine_group;
    benchmarks = bptree_ingest, simulation_cycle
);

main!(library_benchmark_groups = engine_group);
