use gridlib::bptree::BPlusTree;
use gridlib::events::Event;
use gridlib::graph::{
    EdgeSpec, EdgeUpdate, ElectricalNetworkGraph, NetworkSnapshot, NodeSpec, NodeUpdate,
};
use gridlib::io::{fs, HistoricalDataPoint};
use gridlib::{Config, GridContext, GridError};

use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use warp::hyper::body::Bytes;
use warp::{filters::BoxedFilter, Filter};
use warp::{http::StatusCode, reply};

/// Optional file in the data directory overriding the default thresholds.
const CONFIG_FILE: &str = "config.json";

/// Maximum accepted request body size.
const BODY_LIMIT: u64 = 1024 * 1024;

/// Engine state and the directory it is persisted to.
pub struct ServerState {
    pub context: GridContext,
    pub data_dir: PathBuf,
}

impl ServerState {
    /// Loads the saved network and history from `data_dir`, starting empty where nothing was
    /// saved yet.
    pub fn load(data_dir: PathBuf) -> gridlib::Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        let config = if config_path.is_file() {
            Config::read_from_file(&config_path)?
        } else {
            Config::default()
        };
        let graph = fs::load_network(&data_dir)?.unwrap_or_default();
        let history = match fs::load_history(&data_dir)? {
            Some(history) => history,
            None => BPlusTree::new(config.history_order)?,
        };
        Ok(ServerState {
            context: GridContext::from_parts(graph, history, config),
            data_dir,
        })
    }

    fn save_network(&self) -> gridlib::Result<()> {
        fs::save_network(&self.data_dir, &self.context.graph)
    }

    fn save_history(&self) -> gridlib::Result<()> {
        fs::save_history(&self.data_dir, &self.context.history)
    }
}

/// One state for the whole server. Holding the lock for a whole request keeps cycles
/// single-flight.
pub type SharedState = Arc<Mutex<ServerState>>;

type Response = reply::WithStatus<reply::Json>;

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    };
    reply::with_status(reply::json(&body), status)
}

fn reject(status: StatusCode, message: String) -> Response {
    if status.is_server_error() {
        error!("{message}");
    } else {
        warn!("{message}");
    }
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message),
    };
    reply::with_status(reply::json(&body), status)
}

fn status_of(err: &GridError) -> StatusCode {
    match err {
        GridError::NodeNotFound(_) | GridError::EdgeNotFound(_) => StatusCode::NOT_FOUND,
        GridError::Io(_) | GridError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn grid_error(err: GridError) -> Response {
    reject(status_of(&err), err.to_string())
}

/// Like [`grid_error`], but a missing node is a bad edge definition rather than a missing
/// resource.
fn edge_error(err: GridError) -> Response {
    match err {
        GridError::NodeNotFound(_) => reject(StatusCode::BAD_REQUEST, err.to_string()),
        err => grid_error(err),
    }
}

fn parse<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, Response> {
    serde_json::from_value(body)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Invalid {what}: {e}")))
}

fn with_state<F>(shared: &SharedState, handler: F) -> Response
where
    F: FnOnce(&mut ServerState) -> Result<Response, Response>,
{
    let mut state = match shared.lock() {
        Ok(state) => state,
        Err(_) => {
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server state is unavailable".to_string(),
            )
        }
    };
    match handler(&mut state) {
        Ok(response) | Err(response) => response,
    }
}

fn get_network(state: &mut ServerState) -> Result<Response, Response> {
    let graph = &state.context.graph;
    Ok(respond(
        StatusCode::OK,
        json!({
            "nodes": graph.get_all_nodes(),
            "edges": graph.get_all_edges(),
            "stats": graph.get_stats(),
        }),
    ))
}

fn restore_network(state: &mut ServerState, body: Value) -> Result<Response, Response> {
    let snapshot: NetworkSnapshot = parse(body, "network")?;
    state.context.graph = ElectricalNetworkGraph::from_snapshot(snapshot).map_err(grid_error)?;
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, state.context.graph.get_stats()))
}

fn reset_network(state: &mut ServerState) -> Result<Response, Response> {
    fs::reset_network(&state.data_dir).map_err(grid_error)?;
    state.context.graph.clear();
    Ok(respond(StatusCode::OK, "Network reset"))
}

fn add_node(state: &mut ServerState, body: Value) -> Result<Response, Response> {
    let spec: NodeSpec = parse(body, "node")?;
    let node = state.context.graph.add_node(spec).map_err(grid_error)?;
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::CREATED, node))
}

fn update_node(state: &mut ServerState, id: String, body: Value) -> Result<Response, Response> {
    let update: NodeUpdate = parse(body, "node update")?;
    state
        .context
        .graph
        .update_node(&id, update)
        .map_err(grid_error)?;
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, state.context.graph.get_node(&id)))
}

fn remove_node(state: &mut ServerState, id: String) -> Result<Response, Response> {
    if !state.context.graph.remove_node(&id) {
        return Err(grid_error(GridError::NodeNotFound(id)));
    }
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, json!({ "id": id })))
}

fn add_edge(state: &mut ServerState, body: Value) -> Result<Response, Response> {
    let spec: EdgeSpec = parse(body, "edge")?;
    let edge = state.context.graph.add_edge(spec).map_err(edge_error)?;
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::CREATED, edge))
}

fn update_edge(state: &mut ServerState, id: String, body: Value) -> Result<Response, Response> {
    let update: EdgeUpdate = parse(body, "edge update")?;
    state
        .context
        .graph
        .update_edge(&id, update)
        .map_err(edge_error)?;
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, state.context.graph.get_edge(&id)))
}

fn remove_edge(state: &mut ServerState, id: String) -> Result<Response, Response> {
    if !state.context.graph.remove_edge(&id) {
        return Err(grid_error(GridError::EdgeNotFound(id)));
    }
    state.save_network().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, json!({ "id": id })))
}

fn add_history(state: &mut ServerState, body: Value) -> Result<Response, Response> {
    let point: HistoricalDataPoint = parse(body, "history record")?;
    point.validate().map_err(grid_error)?;
    state.context.record(point);
    state.save_history().map_err(grid_error)?;
    Ok(respond(StatusCode::OK, point))
}

fn history_range(
    state: &mut ServerState,
    query: HashMap<String, String>,
) -> Result<Response, Response> {
    let bound = |name: &str| -> Result<i64, Response> {
        let value = query.get(name).ok_or_else(|| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Query parameter '{name}' is required"),
            )
        })?;
        value.trim().parse().map_err(|_| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Query parameter '{name}' must be an integer"),
            )
        })
    };
    let from = bound("from")?;
    let to = bound("to")?;
    if from > to {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            format!("'from' ({from}) must not be greater than 'to' ({to})"),
        ));
    }

    let results = state.context.history.range_query(from, to);
    Ok(respond(
        StatusCode::OK,
        json!({
            "from": from,
            "to": to,
            "count": results.len(),
            "results": results,
        }),
    ))
}

fn history_tree(state: &mut ServerState) -> Result<Response, Response> {
    let history = &state.context.history;
    Ok(respond(
        StatusCode::OK,
        json!({
            "structure": history.tree_structure(),
            "stats": history.stats(),
        }),
    ))
}

fn add_event(state: &mut ServerState, body: Value) -> Result<Response, Response> {
    let event: Event = parse(body, "event")?;
    let summary = json!({
        "type": event.type_name(),
        "severity": event.severity,
        "createdAt": event.created_at,
    });
    state.context.add_event(event);
    Ok(respond(
        StatusCode::OK,
        json!({
            "event": summary,
            "queueSize": state.context.queues.fifo.size(),
        }),
    ))
}

fn queue_view(events: Vec<Event>) -> Value {
    json!({
        "size": events.len(),
        "isEmpty": events.is_empty(),
        "events": events,
    })
}

fn list_events(state: &mut ServerState) -> Result<Response, Response> {
    let queues = &state.context.queues;
    Ok(respond(
        StatusCode::OK,
        json!({
            "fifo": queue_view(queues.fifo.get_all()),
            "heap": queue_view(queues.heap.get_all()),
        }),
    ))
}

/// Network sent along with a cycle request. It replaces the current graph before the cycle.
#[derive(Deserialize)]
struct NetworkSync {
    nodes: Vec<Value>,
    edges: Vec<Value>,
}

/// Rebuilds the graph from `sync`, skipping the nodes and edges that cannot be added.
fn sync_network(graph: &mut ElectricalNetworkGraph, sync: NetworkSync) {
    graph.clear();
    for node in sync.nodes {
        let added = serde_json::from_value::<NodeSpec>(node)
            .map_err(GridError::from)
            .and_then(|spec| graph.add_node(spec));
        if let Err(e) = added {
            warn!("Skipping node while syncing the network: {e}");
        }
    }
    for edge in sync.edges {
        let added = serde_json::from_value::<EdgeSpec>(edge)
            .map_err(GridError::from)
            .and_then(|spec| graph.add_edge(spec));
        if let Err(e) = added {
            warn!("Skipping edge while syncing the network: {e}");
        }
    }
}

/// Runs one cycle. A body carrying `nodes` and `edges` arrays replaces the network first; an
/// empty body or one without them leaves the network as it is.
fn run_simulation(state: &mut ServerState, body: Bytes) -> Result<Response, Response> {
    if body.len() as u64 > BODY_LIMIT {
        return Err(reject(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body is too large".to_string(),
        ));
    }
    if !body.iter().all(u8::is_ascii_whitespace) {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Invalid network: {e}")))?;
        if let Ok(sync) = serde_json::from_value::<NetworkSync>(value) {
            sync_network(&mut state.context.graph, sync);
            state.save_network().map_err(grid_error)?;
        }
    }
    let result = state.context.run_cycle(true);
    if let Err(e) = state.save_history() {
        warn!("Cannot save consumption history: {e}");
    }
    Ok(respond(StatusCode::OK, result))
}

/// Every route combined for a single engine
pub fn api(shared: SharedState) -> BoxedFilter<(Response,)> {
    let state = warp::any().map(move || shared.clone());
    let body = || warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json::<Value>());

    let get_network_route = warp::path!("api" / "network")
        .and(warp::get())
        .and(state.clone())
        .map(|s: SharedState| with_state(&s, get_network));
    let restore_network_route = warp::path!("api" / "network")
        .and(warp::post())
        .and(body())
        .and(state.clone())
        .map(|body: Value, s: SharedState| with_state(&s, |st| restore_network(st, body)));
    let reset_network_route = warp::path!("api" / "network")
        .and(warp::delete())
        .and(state.clone())
        .map(|s: SharedState| with_state(&s, reset_network));

    let add_node_route = warp::path!("api" / "network" / "node")
        .and(warp::post())
        .and(body())
        .and(state.clone())
        .map(|body: Value, s: SharedState| with_state(&s, |st| add_node(st, body)));
    let update_node_route = warp::path!("api" / "network" / "node" / String)
        .and(warp::patch())
        .and(body())
        .and(state.clone())
        .map(|id: String, body: Value, s: SharedState| {
            with_state(&s, |st| update_node(st, id, body))
        });
    let remove_node_route = warp::path!("api" / "network" / "node" / String)
        .and(warp::delete())
        .and(state.clone())
        .map(|id: String, s: SharedState| with_state(&s, |st| remove_node(st, id)));

    let add_edge_route = warp::path!("api" / "network" / "edge")
        .and(warp::post())
        .and(body())
        .and(state.clone())
        .map(|body: Value, s: SharedState| with_state(&s, |st| add_edge(st, body)));
    let update_edge_route = warp::path!("api" / "network" / "edge" / String)
        .and(warp::patch())
        .and(body())
        .and(state.clone())
        .map(|id: String, body: Value, s: SharedState| {
            with_state(&s, |st| update_edge(st, id, body))
        });
    let remove_edge_route = warp::path!("api" / "network" / "edge" / String)
        .and(warp::delete())
        .and(state.clone())
        .map(|id: String, s: SharedState| with_state(&s, |st| remove_edge(st, id)));

    let add_history_route = warp::path!("api" / "history" / "add")
        .and(warp::post())
        .and(body())
        .and(state.clone())
        .map(|body: Value, s: SharedState| with_state(&s, |st| add_history(st, body)));
    let history_range_route = warp::path!("api" / "history" / "range")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state.clone())
        .map(|query: HashMap<String, String>, s: SharedState| {
            with_state(&s, |st| history_range(st, query))
        });
    let history_tree_route = warp::path!("api" / "history" / "tree")
        .and(warp::get())
        .and(state.clone())
        .map(|s: SharedState| with_state(&s, history_tree));

    let add_event_route = warp::path!("api" / "simulation" / "event")
        .and(warp::post())
        .and(body())
        .and(state.clone())
        .map(|body: Value, s: SharedState| with_state(&s, |st| add_event(st, body)));
    let list_events_route = warp::path!("api" / "simulation" / "events")
        .and(warp::get())
        .and(state.clone())
        .map(|s: SharedState| with_state(&s, list_events));
    let run_route = warp::path!("api" / "simulation" / "run")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(state)
        .map(|body: Bytes, s: SharedState| with_state(&s, |st| run_simulation(st, body)));

    get_network_route
        .or(restore_network_route)
        .unify()
        .or(reset_network_route)
        .unify()
        .or(add_node_route)
        .unify()
        .or(update_node_route)
        .unify()
        .or(remove_node_route)
        .unify()
        .or(add_edge_route)
        .unify()
        .or(update_edge_route)
        .unify()
        .or(remove_edge_route)
        .unify()
        .or(add_history_route)
        .unify()
        .or(history_range_route)
        .unify()
        .or(history_tree_route)
        .unify()
        .or(add_event_route)
        .unify()
        .or(list_events_route)
        .unify()
        .or(run_route)
        .unify()
        .boxed()
}
