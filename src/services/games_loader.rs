use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use futures_util::future::join_all;
use tokio::time::sleep;

use super::game_view::{load_game_view, viewer_state};
use crate::chain::GameContract;
use crate::config::Config;
use crate::error::Result;
use crate::models::{GameBuckets, GameStatus, GameView};

#[derive(Debug, Clone)]
pub struct LoaderPolicy {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl LoaderPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.loader_batch_size.max(1),
            batch_delay: Duration::from_millis(config.loader_batch_delay_ms),
            max_attempts: config.loader_max_attempts.max(1),
            backoff_base: Duration::from_millis(config.loader_backoff_base_ms),
        }
    }

    /// Wait before retrying after failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1_u32 << attempt.min(16))
    }
}

/// Loads the full game list in fixed-size batches.
pub struct GamesLoader {
    contract: Arc<dyn GameContract>,
    policy: LoaderPolicy,
}

impl GamesLoader {
    pub fn new(contract: Arc<dyn GameContract>, policy: LoaderPolicy) -> Self {
        Self { contract, policy }
    }

    /// Loads games `0..latestGameId`. Games that keep failing are dropped.
    pub async fn load_all(&self) -> Result<Vec<GameView>> {
        let latest = self.contract.latest_game_id().await?;
        Ok(self.load_range(latest).await)
    }

    pub async fn load_range(&self, latest: u64) -> Vec<GameView> {
        let ids: Vec<u64> = (0..latest).collect();
        let mut games = Vec::with_capacity(ids.len());
        let batch_count = ids.chunks(self.policy.batch_size).count();

        for (index, batch) in ids.chunks(self.policy.batch_size).enumerate() {
            let results = join_all(batch.iter().map(|game_id| self.load_with_retry(*game_id))).await;
            games.extend(results.into_iter().flatten());

            if index + 1 < batch_count && !self.policy.batch_delay.is_zero() {
                sleep(self.policy.batch_delay).await;
            }
        }

        tracing::debug!("Loaded {} of {} games", games.len(), latest);
        games
    }

    async fn load_with_retry(&self, game_id: u64) -> Option<GameView> {
        let mut attempt = 0;
        loop {
            match load_game_view(self.contract.as_ref(), game_id, None).await {
                Ok(game) => return Some(game),
                Err(err) if !err.is_transient() => {
                    tracing::debug!("Skipping game {}: {}", game_id, err);
                    return None;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        tracing::error!(
                            "Dropping game {} after {} attempts: {}",
                            game_id,
                            attempt,
                            err
                        );
                        return None;
                    }
                    let wait = self.policy.backoff(attempt - 1);
                    tracing::debug!(
                        "Game {} load failed (attempt {}), retrying in {}ms: {}",
                        game_id,
                        attempt,
                        wait.as_millis(),
                        err
                    );
                    if !wait.is_zero() {
                        sleep(wait).await;
                    }
                }
            }
        }
    }
}

/// Splits a game list into the open lobby and the viewer's own games.
/// Games started from challenges are left out of every bucket; `total`
/// still counts every loaded game.
pub fn bucket_games(
    games: Vec<GameView>,
    viewer: Option<Address>,
    challenge_game_ids: &HashSet<u64>,
) -> GameBuckets {
    let mut buckets = GameBuckets {
        total: games.len(),
        ..GameBuckets::default()
    };

    for game in games
        .into_iter()
        .filter(|game| !challenge_game_ids.contains(&game.game_id))
    {
        let is_participant = viewer_state(&game, viewer).is_participant;
        match game.status {
            GameStatus::Waiting => buckets.open.push(game),
            GameStatus::Active if is_participant => buckets.my_active.push(game),
            GameStatus::Finished if is_participant => buckets.my_past.push(game),
            GameStatus::Active | GameStatus::Finished => {}
        }
    }

    buckets
}
