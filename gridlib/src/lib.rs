//! # Grid Simulation Library
//!
//! Network model, indices, event queues and the simulation cycle shared by the grid server and
//! command line interface.

pub mod avl;
pub mod balance;
pub mod bptree;
mod config;
pub mod context;
pub mod events;
pub mod graph;
pub mod io;
pub mod pathfinding;
pub mod queue;
pub mod simulation;
pub mod types;
pub mod utils;

pub use config::Config;
pub use context::GridContext;
pub use types::*;

/// Represents the reasons why an operation on the engine might fail.
#[derive(thiserror::Error, Debug)]
pub enum GridError {
    #[error("Node with id {0} already exists")]
    DuplicateNode(String),
    #[error("Edge with id {0} already exists")]
    DuplicateEdge(String),
    #[error("Node {0} does not exist")]
    NodeNotFound(String),
    #[error("Edge {0} does not exist")]
    EdgeNotFound(String),
    #[error("Edge cannot connect node {0} to itself")]
    SelfLoop(String),
    #[error("An edge between {origin} and {destination} already exists")]
    ParallelEdge { origin: String, destination: String },
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("B+Tree order must be at least 2, got {0}")]
    InvalidOrder(usize),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, GridError>;
