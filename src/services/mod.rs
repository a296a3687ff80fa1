pub mod board;
pub mod challenge_view;
pub mod game_view;
pub mod game_watcher;
pub mod games_loader;
pub mod network;
pub mod transactions;

pub use game_watcher::{spawn_game_watcher, StopReason, WatchEvent, WatchHandle};
pub use games_loader::{GamesLoader, LoaderPolicy};
pub use network::{NetworkGuard, NetworkStatus};
pub use transactions::{AdminAction, GameTransactor};

use std::sync::Arc;
use std::time::Duration;

use crate::constants::NETWORK_CHECK_INTERVAL_SECS;

/// Start all background services
pub async fn start_background_services(network: Arc<NetworkGuard>) {
    tracing::info!("Starting background services...");

    let status = network.refresh().await;
    match status.connected_chain_id {
        Some(chain_id) if !status.chain_mismatch => {
            tracing::info!("Connected to chain {}", chain_id)
        }
        Some(_) => {}
        None => tracing::warn!("Chain id unknown at startup"),
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(NETWORK_CHECK_INTERVAL_SECS));
        // first tick fires immediately and the startup check already ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            network.refresh().await;
        }
    });

    tracing::info!("All background services started successfully");
}
