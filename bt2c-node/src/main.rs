use std::path::PathBuf;

use bt2c_node::run_node;

// The node runs a cooperative single-threaded scheduler (one node, one
// thread, lock order chain -> validator -> mempool); the current-thread
// runtime matches that model instead of handing tasks to a work-stealing
// pool that would make the lock ordering concurrently reachable.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let path = std::env::var("BT2C_CONFIG").unwrap_or_else(|_| "config/bt2c.toml".to_string());
    if let Err(e) = run_node(PathBuf::from(path)).await {
        eprintln!("node failed: {e:?}");
    }
}
