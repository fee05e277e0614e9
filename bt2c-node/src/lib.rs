//! Wires the consensus, chain, mempool, and wallet crates into a running
//! block-producing node: config loading, an in-memory `Store`/`Transport`
//! pair (the concrete network and database backends are deliberately
//! out of scope), and the cooperative scheduler that drives block
//! production on a fixed interval.

pub mod error;
pub mod genesis;
pub mod node;
pub mod scheduler;
pub mod store;
pub mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use bt2c_config::NodeConfig;
use bt2c_crypto::DefaultCryptoProvider;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub use error::NodeError;
pub use node::Node;
pub use store::InMemoryStore;
pub use transport::LoopbackTransport;

/// Loads configuration, constructs a [`Node`], and runs the scheduler
/// until a Ctrl-C or the returned shutdown sender fires.
pub async fn run_node(config_path: PathBuf) -> Result<()> {
    let cfg = NodeConfig::load(&config_path)?;
    init_logging(&cfg.log_level);
    info!("starting bt2c node with config {:?}", config_path);

    let crypto = Arc::new(DefaultCryptoProvider::new());
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(LoopbackTransport::new());
    let node = Arc::new(Node::new(cfg.chain, crypto, store, transport)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler::run(node.clone(), shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    scheduler_task.await?;
    Ok(())
}

fn init_logging(level: &str) {
    let max_level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(max_level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
