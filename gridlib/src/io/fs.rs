//! A module responsible for the file system operations of the engine.
//!
//! State lives in a data directory holding `network.json` (graph snapshot) and `history.json`
//! (consumption history snapshot). A missing file means that nothing was saved yet.
use super::EventBatch;
use crate::bptree::{BPlusTree, BPlusTreeSnapshot};
use crate::events::Event;
use crate::graph::{ElectricalNetworkGraph, NetworkSnapshot};
use crate::types::Load;
use crate::Result;

use serde::de::DeserializeOwned;
use serde::Serialize;

use std::io::ErrorKind;
use std::path::Path;

pub const NETWORK_FILE: &str = "network.json";
pub const HISTORY_FILE: &str = "history.json";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Writes `value` as a human-readable (pretty) JSON file, creating parent directories.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    log::info!("Saved {}", path.display());
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn load_network(dir: &Path) -> Result<Option<ElectricalNetworkGraph>> {
    match read_json::<NetworkSnapshot>(&dir.join(NETWORK_FILE))? {
        Some(snapshot) => Ok(Some(ElectricalNetworkGraph::from_snapshot(snapshot)?)),
        None => Ok(None),
    }
}

pub fn save_network(dir: &Path, graph: &ElectricalNetworkGraph) -> Result<()> {
    write_json(&dir.join(NETWORK_FILE), &graph.snapshot())
}

pub fn reset_network(dir: &Path) -> Result<()> {
    remove_file(&dir.join(NETWORK_FILE))
}

pub fn load_history(dir: &Path) -> Result<Option<BPlusTree<Load>>> {
    match read_json::<BPlusTreeSnapshot<Load>>(&dir.join(HISTORY_FILE))? {
        Some(snapshot) => Ok(Some(BPlusTree::deserialize(snapshot)?)),
        None => Ok(None),
    }
}

pub fn save_history(dir: &Path, history: &BPlusTree<Load>) -> Result<()> {
    write_json(&dir.join(HISTORY_FILE), &history.serialize())
}

pub fn reset_history(dir: &Path) -> Result<()> {
    remove_file(&dir.join(HISTORY_FILE))
}

/// Reads a network snapshot file given by the user. Unlike [`load_network`], a missing file is
/// an error.
pub fn read_network_file<P: AsRef<Path>>(path: P) -> Result<ElectricalNetworkGraph> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: NetworkSnapshot = serde_json::from_str(&content)?;
    ElectricalNetworkGraph::from_snapshot(snapshot)
}

pub fn write_network_file<P: AsRef<Path>>(path: P, graph: &ElectricalNetworkGraph) -> Result<()> {
    write_json(path.as_ref(), &graph.snapshot())
}

/// Reads an event file. Every event is validated while decoding.
pub fn read_events_file<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    let content = std::fs::read_to_string(path)?;
    let batch: EventBatch = serde_json::from_str(&content)?;
    Ok(batch.into_events())
}

/// Reads a history snapshot file, or starts an empty history of the given order if the file
/// does not exist.
pub fn read_history_file<P: AsRef<Path>>(path: P, order: usize) -> Result<BPlusTree<Load>> {
    match read_json::<BPlusTreeSnapshot<Load>>(path.as_ref())? {
        Some(snapshot) => BPlusTree::deserialize(snapshot),
        None => BPlusTree::new(order),
    }
}

pub fn write_history_file<P: AsRef<Path>>(path: P, history: &BPlusTree<Load>) -> Result<()> {
    write_json(path.as_ref(), &history.serialize())
}
