use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::node::Node;

/// Drives the node's periodic work: block production on the configured
/// cadence, mempool TTL pruning, and exit-queue maturation. Each loop
/// selects against `shutdown` so a cancellation is observed within at most
/// one tick, rather than waiting out a long sleep.
pub async fn run(node: Arc<Node>, mut shutdown: watch::Receiver<bool>) {
    let block_interval = Duration::from_secs(node.config().block_time_secs.max(1));
    let mut block_ticker = time::interval(block_interval);
    let mut prune_ticker = time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = block_ticker.tick() => {
                produce_one_block(&node).await;
            }
            _ = prune_ticker.tick() => {
                let now = bt2c_core::now_ts();
                let expired = node_prune(&node, now);
                if expired > 0 {
                    tracing::debug!(expired, "pruned expired mempool entries");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("scheduler received shutdown signal");
                    break;
                }
            }
        }
    }
}

async fn produce_one_block(node: &Arc<Node>) {
    let started = Instant::now();
    let now = bt2c_core::now_ts();
    match node.process_matured_exits(node.tip_height()).await {
        Ok(completed) if !completed.is_empty() => {
            tracing::info!(count = completed.len(), "paid out matured unstake requests");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "failed to process exit queue"),
    }

    match node
        .produce_block(now, now * 1000, started.elapsed().as_secs_f64() * 1000.0)
        .await
    {
        Ok(block) => {
            tracing::info!(height = block.header.height, "block production tick complete");
        }
        Err(err) => {
            tracing::warn!(%err, "block production tick skipped");
        }
    }
}

/// Mempool pruning is synchronous, so it's split out from the async tick
/// handler above purely for readability.
fn node_prune(node: &Arc<Node>, now: u64) -> usize {
    node.prune_mempool(now)
}
