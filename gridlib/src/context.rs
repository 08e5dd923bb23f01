//! Engine state owned by one process: the network, its consumption history and the event queues.
use crate::bptree::BPlusTree;
use crate::config::Config;
use crate::events::{demo_events, Event};
use crate::graph::ElectricalNetworkGraph;
use crate::io::HistoricalDataPoint;
use crate::queue::EventQueues;
use crate::simulation::{run_simulation_cycle_with, SimulationResult};
use crate::types::Load;
use crate::utils::now_millis;
use crate::Result;

/// Everything a simulation cycle reads or writes.
///
/// Cycles take `&mut self`, so callers sharing a context between threads must lock it for the
/// whole cycle.
#[derive(Debug, Clone)]
pub struct GridContext {
    pub graph: ElectricalNetworkGraph,
    pub history: BPlusTree<Load>,
    pub queues: EventQueues,
    pub config: Config,
}

impl GridContext {
    /// Creates an empty context. Fails if the configured history order is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let history = BPlusTree::new(config.history_order)?;
        Ok(Self::from_parts(ElectricalNetworkGraph::new(), history, config))
    }

    pub fn from_parts(
        graph: ElectricalNetworkGraph,
        history: BPlusTree<Load>,
        config: Config,
    ) -> Self {
        GridContext {
            graph,
            history,
            queues: EventQueues::new(),
            config,
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.queues.add_event(event);
    }

    pub fn record(&mut self, point: HistoricalDataPoint) {
        self.history.insert(point.timestamp, point.consumption);
    }

    /// Runs one simulation cycle.
    ///
    /// With `generate_demo_events`, random events are queued first if the FIFO is empty. A
    /// positive resulting consumption is recorded in the history at the current time.
    pub fn run_cycle(&mut self, generate_demo_events: bool) -> SimulationResult {
        if generate_demo_events && self.queues.fifo.is_empty() {
            let nodes = self.graph.get_all_nodes();
            let events = demo_events(&mut rand::thread_rng(), &nodes);
            log::info!("Generated {} demo events", events.len());
            for event in events {
                self.queues.add_event(event);
            }
        }

        let result = run_simulation_cycle_with(
            &mut self.graph,
            &mut self.queues.fifo,
            &mut self.queues.heap,
            &self.config,
        );
        if result.metrics.consumption > 0.0 {
            self.record(HistoricalDataPoint {
                timestamp: now_millis(),
                consumption: result.metrics.consumption,
            });
        }
        result
    }
}
