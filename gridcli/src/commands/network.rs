//! Path search and statistics on a network file.
use super::*;

use gridlib::balance::LoadBalancer;
use gridlib::pathfinding::{AStar, Dijkstra, Heuristic, PathFinder, ShortestPath};

impl FindPath {
    pub fn run(self) {
        let FindPath {
            network,
            from,
            to,
            algorithm,
            zero_heuristic,
            json,
        } = self;
        let graph = read_network(&network);

        let result: ShortestPath = match algorithm {
            Algorithm::Dijkstra => Dijkstra.find_path(&graph, &from, &to),
            Algorithm::Astar => {
                let heuristic = if zero_heuristic {
                    Heuristic::Zero
                } else {
                    Heuristic::NumericId
                };
                AStar::new(heuristic).find_path(&graph, &from, &to)
            }
        };

        if json {
            print_json(&result);
            return;
        }
        if result.is_found() {
            println!("{:12}{}", "Path:".bold(), result.path.join(" -> "));
            println!("{:12}{}", "Distance:".bold(), result.distance);
            println!("{:12}{}", "Hops:".bold(), result.hops());
        } else {
            println!("{}", format!("No path between {} and {}", from, to).red());
        }
        println!("{:12}{}", "Operations:".bold(), result.operations);
    }
}

impl Stats {
    pub fn run(self) {
        let Stats { network, json } = self;
        let mut graph = read_network(&network);
        let stats = graph.get_stats();
        let balance = LoadBalancer::new(&mut graph).balance_stats();

        if json {
            print_json(&serde_json::json!({ "network": stats, "balance": balance }));
            return;
        }
        println!("{:18}{}", "Nodes:".bold(), stats.total_nodes);
        println!("{:>18}{}", "producer: ".bold(), stats.nodes_by_type.producer);
        println!("{:>18}{}", "consumer: ".bold(), stats.nodes_by_type.consumer);
        println!("{:>18}{}", "substation: ".bold(), stats.nodes_by_type.substation);
        println!("{:>18}{}", "transmission: ".bold(), stats.nodes_by_type.transmission);
        println!("{:18}{}", "Active Nodes:".bold(), stats.active_nodes);
        println!("{:18}{}", "Inactive Nodes:".bold(), stats.inactive_nodes);
        println!("{:18}{}", "Edges:".bold(), stats.total_edges);
        println!("{:18}{:.2}", "Losses:".bold(), stats.total_losses);
        println!("{:18}{:.2}%", "Efficiency:".bold(), stats.total_efficiency);
        println!("{:18}{:.2}", "Consumption:".bold(), stats.total_consumption);
        println!("{:18}{}", "Overloaded:".bold(), balance.overloaded_count);
        println!("{:18}{}", "Underloaded:".bold(), balance.underloaded_count);
        println!(
            "{:18}{:.1}%",
            "Avg Utilization:".bold(),
            balance.avg_utilization * 100.0
        );
    }
}
