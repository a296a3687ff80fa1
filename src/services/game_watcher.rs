use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::game_view::load_snapshot;
use crate::chain::GameContract;
use crate::models::{Board, GameSnapshot, GameStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    YourTurn,
    GameFinished,
    NotInProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    Snapshot { snapshot: GameSnapshot },
    Error { message: String },
    Stopped { reason: StopReason },
}

/// Polling continues only while the game is active and the viewer is waiting on the opponent.
pub fn stop_reason(snapshot: &GameSnapshot) -> Option<StopReason> {
    match snapshot.game.status {
        GameStatus::Finished => Some(StopReason::GameFinished),
        GameStatus::Waiting => Some(StopReason::NotInProgress),
        GameStatus::Active if snapshot.viewer.is_my_turn => Some(StopReason::YourTurn),
        GameStatus::Active => None,
    }
}

/// Owns a running watcher; dropping it cancels the polling task.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a task that emits a snapshot immediately and then every `every`
/// until a stop condition is met or the receiver goes away.
pub fn spawn_game_watcher(
    contract: Arc<dyn GameContract>,
    game_id: u64,
    viewer: Option<Address>,
    every: Duration,
    events: mpsc::Sender<WatchEvent>,
) -> WatchHandle {
    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_board: Option<Board> = None;

        loop {
            ticker.tick().await;

            match load_snapshot(contract.as_ref(), game_id, viewer).await {
                Ok(mut snapshot) => {
                    match &snapshot.board {
                        Some(board) => last_board = Some(board.clone()),
                        None => snapshot.board = last_board.clone(),
                    }
                    let stop = stop_reason(&snapshot);
                    if events.send(WatchEvent::Snapshot { snapshot }).await.is_err() {
                        return;
                    }
                    if let Some(reason) = stop {
                        tracing::debug!("Watcher for game {} stopped: {:?}", game_id, reason);
                        let _ = events.send(WatchEvent::Stopped { reason }).await;
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!("Watcher refresh for game {} failed: {}", game_id, err);
                    let message = err.to_string();
                    if events.send(WatchEvent::Error { message }).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    WatchHandle { task }
}
