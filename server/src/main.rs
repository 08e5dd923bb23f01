use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

mod routes;
use routes::ServerState;

/// Address used when `GRIDSIM_ADDR` is not set.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Directory holding `network.json` and `history.json` when `GRIDSIM_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "data/";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addrstr = std::env::var("GRIDSIM_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = match addrstr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            log::error!("Cannot parse the address {addrstr}: {e}");
            return;
        }
    };
    let data_dir: PathBuf = std::env::var("GRIDSIM_DATA_DIR")
        .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string())
        .into();

    let state = match ServerState::load(data_dir) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Cannot load the saved state: {e}");
            return;
        }
    };
    log::info!(
        "Loaded network with {} nodes and {} history entries",
        state.context.graph.node_count(),
        state.context.history.len()
    );
    let api = routes::api(Arc::new(Mutex::new(state)));

    log::info!("Listening on {addr}");
    let server = warp::serve(api).run(addr);
    server.await;
}
