use super::*;

use gridlib::bptree::BPlusTree;
use gridlib::graph::ElectricalNetworkGraph;
use gridlib::io::fs::{read_history_file, read_network_file};
use gridlib::Load;

mod history;
pub use history::*;

mod network;
pub use network::*;

mod simulate;
pub use simulate::*;

/// All CLI commands available in this binary.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Run simulation cycles on a network file.
    #[command(alias = "sim")]
    Simulate(Simulate),

    /// Find the shortest path between two nodes.
    #[command(alias = "p")]
    Path(FindPath),

    /// Print the statistics of a network file.
    Stats(Stats),

    /// Read or extend a consumption history file.
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(clap::Args, Debug)]
pub struct Simulate {
    /// Path to the network JSON file.
    network: PathBuf,
    /// JSON file with the events to queue before the first cycle.
    #[arg(short, long)]
    events: Option<PathBuf>,
    /// Number of cycles to run.
    #[arg(short, long, default_value_t = 1)]
    cycles: usize,
    /// Generate random events whenever the queue is empty.
    #[arg(short, long, default_value_t = false)]
    demo_events: bool,
    /// Path to a JSON file overriding the default thresholds.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the results as JSON (Hint: redirect stdout)
    #[arg(short, long, default_value_t = false)]
    json: bool,
    /// Save the resulting network to this file.
    #[arg(short, long)]
    save: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Dijkstra,
    Astar,
}

#[derive(clap::Args, Debug)]
pub struct FindPath {
    /// Path to the network JSON file.
    network: PathBuf,
    /// Id of the start node.
    from: String,
    /// Id of the end node.
    to: String,
    #[arg(short, long, value_enum, default_value_t = Algorithm::Astar)]
    algorithm: Algorithm,
    /// Use a zero heuristic with A* (always optimal, explores more nodes).
    #[arg(long, default_value_t = false)]
    zero_heuristic: bool,
    /// Print the result as JSON.
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct Stats {
    /// Path to the network JSON file.
    network: PathBuf,
    /// Print the statistics as JSON.
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum HistoryCommand {
    /// Add a measurement. The file is created if it does not exist.
    Add {
        /// Path to the history JSON file.
        history: PathBuf,
        /// Timestamp in milliseconds.
        timestamp: i64,
        consumption: Load,
        /// Order of a newly created tree.
        #[arg(short, long, default_value_t = 4)]
        order: usize,
    },
    /// Print the measurements between two timestamps (inclusive).
    Range {
        history: PathBuf,
        from: i64,
        to: i64,
        #[arg(short, long, default_value_t = false)]
        json: bool,
    },
    /// Print the tree structure as JSON.
    Tree { history: PathBuf },
    /// Print the shape of the tree.
    Stats { history: PathBuf },
}

impl Command {
    pub fn run(self) {
        match self {
            Command::Simulate(args) => args.run(),
            Command::Path(args) => args.run(),
            Command::Stats(args) => args.run(),
            Command::History { command } => command.run(),
        }
    }
}

fn read_network<P: AsRef<Path>>(path: P) -> ElectricalNetworkGraph {
    match read_network_file(&path) {
        Ok(graph) => graph,
        Err(err) => fatal_error!(
            1,
            "Cannot read network {}: {}",
            path.as_ref().display(),
            err
        ),
    }
}

fn read_history<P: AsRef<Path>>(path: P, order: usize) -> BPlusTree<Load> {
    match read_history_file(&path, order) {
        Ok(history) => history,
        Err(err) => fatal_error!(
            1,
            "Cannot read history {}: {}",
            path.as_ref().display(),
            err
        ),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fatal_error!(1, "Error while serializing results: {}", e),
    }
}
