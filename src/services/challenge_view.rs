use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use futures_util::stream::{self, StreamExt};

use crate::chain::erc20::format_units;
use crate::chain::GameContract;
use crate::constants::{LOADER_BATCH_SIZE, NATIVE_TOKEN_DECIMALS};
use crate::error::Result;
use crate::models::{
    ChallengeDirection, ChallengeStatus, ChallengeView, ContractGameStatus, PlayerChallenges,
    RawChallenge,
};

/// Pending until accepted; finished once the linked game has ended or been forfeited.
pub fn classify(accepted: bool, linked_game: Option<ContractGameStatus>) -> ChallengeStatus {
    if !accepted {
        return ChallengeStatus::Pending;
    }
    match linked_game {
        Some(status) if status.is_terminal() => ChallengeStatus::Finished,
        _ => ChallengeStatus::Active,
    }
}

pub fn direction(raw: &RawChallenge, viewer: Option<Address>) -> Option<ChallengeDirection> {
    let viewer = viewer.filter(|address| !address.is_zero())?;
    if raw.challenged == viewer {
        Some(ChallengeDirection::Incoming)
    } else if raw.challenger == viewer {
        Some(ChallengeDirection::Outgoing)
    } else {
        None
    }
}

fn linked_game_id(raw: &RawChallenge) -> Option<u64> {
    if raw.game_id.is_zero() || raw.game_id > U256::from(u64::MAX) {
        None
    } else {
        Some(raw.game_id.as_u64())
    }
}

fn created_at(raw: &RawChallenge) -> Option<DateTime<Utc>> {
    if raw.timestamp.is_zero() || raw.timestamp > U256::from(i64::MAX as u64) {
        return None;
    }
    DateTime::<Utc>::from_timestamp(raw.timestamp.as_u64() as i64, 0)
}

pub fn build_challenge_view(
    challenge_id: u64,
    raw: RawChallenge,
    linked_game: Option<ContractGameStatus>,
    viewer: Option<Address>,
) -> ChallengeView {
    let status = classify(raw.accepted, linked_game);
    let direction = direction(&raw, viewer);
    let game_id = linked_game_id(&raw);

    ChallengeView {
        challenge_id,
        bet_amount_formatted: format_units(raw.bet_amount, NATIVE_TOKEN_DECIMALS),
        is_native_bet: raw.token_address.is_zero(),
        created_at: created_at(&raw),
        game_id,
        status,
        can_accept: direction == Some(ChallengeDirection::Incoming) && !raw.accepted,
        direction,
        challenger: raw.challenger,
        challenger_username: raw.challenger_username,
        challenged: raw.challenged,
        challenged_username: raw.challenged_username,
        bet_amount: raw.bet_amount,
        token_address: raw.token_address,
        board_size: raw.board_size,
        accepted: raw.accepted,
    }
}

/// Reads one challenge and, when accepted, the status of its game.
pub async fn load_challenge(
    contract: &dyn GameContract,
    challenge_id: u64,
    viewer: Option<Address>,
) -> Result<ChallengeView> {
    let raw = contract.challenge(challenge_id).await?;
    let linked_game = match linked_game_id(&raw).filter(|_| raw.accepted) {
        Some(game_id) => match contract.game(game_id, None).await {
            Ok(game) => Some(game.status),
            Err(err) => {
                tracing::debug!(
                    "linked game {} of challenge {} unreadable: {}",
                    game_id,
                    challenge_id,
                    err
                );
                None
            }
        },
        None => None,
    };
    Ok(build_challenge_view(challenge_id, raw, linked_game, viewer))
}

/// Loads every challenge involving `player`; unreadable challenges are skipped.
/// Counts are taken from the same set that is returned.
pub async fn load_player_challenges(
    contract: &dyn GameContract,
    player: Address,
) -> Result<PlayerChallenges> {
    let ids = contract.player_challenges(player).await?;

    let results: Vec<(u64, Result<ChallengeView>)> = stream::iter(ids)
        .map(|challenge_id| async move {
            (
                challenge_id,
                load_challenge(contract, challenge_id, Some(player)).await,
            )
        })
        .buffered(LOADER_BATCH_SIZE)
        .collect()
        .await;

    let mut seen = HashSet::new();
    let mut challenges = Vec::with_capacity(results.len());
    for (challenge_id, result) in results {
        match result {
            Ok(view) if seen.insert(view.challenge_id) => challenges.push(view),
            Ok(_) => {}
            Err(err) => tracing::warn!("Skipping challenge {}: {}", challenge_id, err),
        }
    }

    Ok(PlayerChallenges {
        player,
        incoming_count: count_direction(&challenges, ChallengeDirection::Incoming),
        outgoing_count: count_direction(&challenges, ChallengeDirection::Outgoing),
        challenges,
    })
}

fn count_direction(challenges: &[ChallengeView], wanted: ChallengeDirection) -> usize {
    challenges
        .iter()
        .filter(|challenge| challenge.direction == Some(wanted))
        .count()
}

pub fn filter_challenges(
    challenges: &[ChallengeView],
    tab: Option<ChallengeDirection>,
    status: Option<ChallengeStatus>,
) -> Vec<ChallengeView> {
    challenges
        .iter()
        .filter(|challenge| tab.is_none() || challenge.direction == tab)
        .filter(|challenge| status.map_or(true, |wanted| challenge.status == wanted))
        .cloned()
        .collect()
}

/// Ids of games started from accepted challenges.
pub fn challenge_game_ids(challenges: &[ChallengeView]) -> HashSet<u64> {
    challenges
        .iter()
        .filter(|challenge| challenge.accepted)
        .filter_map(|challenge| challenge.game_id)
        .collect()
}
