use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};

use super::board::load_board;
use crate::chain::erc20::format_units;
use crate::chain::GameContract;
use crate::constants::NATIVE_TOKEN_DECIMALS;
use crate::error::{AppError, Result};
use crate::models::{
    BoardRead, GameSnapshot, GameStatus, GameView, RawGame, RewardStatus, ViewerState,
};
use crate::utils::non_zero;

/// Terminal contract status wins; otherwise a filled second seat means the game is running.
pub fn derive_status(raw: &RawGame) -> GameStatus {
    if raw.status.is_terminal() {
        GameStatus::Finished
    } else if !raw.player_two.is_zero() {
        GameStatus::Active
    } else {
        GameStatus::Waiting
    }
}

fn timestamp(value: U256) -> Option<DateTime<Utc>> {
    if value.is_zero() || value > U256::from(i64::MAX as u64) {
        return None;
    }
    DateTime::<Utc>::from_timestamp(value.as_u64() as i64, 0)
}

/// Builds the view model for one game. `time_remaining` is only kept for active games.
pub fn build_game_view(game_id: u64, raw: &RawGame, time_remaining: Option<u64>) -> GameView {
    let status = derive_status(raw);
    let time_remaining = if status == GameStatus::Active {
        time_remaining
    } else {
        None
    };
    let current_player = if raw.is_player_one_turn {
        Some(raw.player_one)
    } else {
        non_zero(raw.player_two)
    };
    let winner = if status == GameStatus::Finished {
        non_zero(raw.winner)
    } else {
        None
    };

    GameView {
        game_id,
        player_one: raw.player_one,
        player_two: non_zero(raw.player_two),
        bet_amount: raw.bet_amount,
        bet_amount_formatted: format_units(raw.bet_amount, NATIVE_TOKEN_DECIMALS),
        token_address: raw.token_address,
        is_native_bet: raw.token_address.is_zero(),
        status,
        contract_status: raw.status,
        current_player,
        winner,
        is_draw: status == GameStatus::Finished && winner.is_none(),
        time_remaining,
        can_forfeit: time_remaining == Some(0),
        board_size: raw.board_size,
        last_move_at: timestamp(raw.last_move_timestamp),
        fetched_at: Utc::now(),
    }
}

/// Flags for `viewer`; all false when no viewer is known.
pub fn viewer_state(game: &GameView, viewer: Option<Address>) -> ViewerState {
    let Some(viewer) = viewer.filter(|address| !address.is_zero()) else {
        return ViewerState::default();
    };

    let is_player_one = game.player_one == viewer;
    let is_player_two = game.player_two == Some(viewer);
    let is_participant = is_player_one || is_player_two;
    let is_my_turn = game.status == GameStatus::Active && game.current_player == Some(viewer);

    ViewerState {
        is_player_one,
        is_player_two,
        is_participant,
        can_join: game.status == GameStatus::Waiting && !is_player_one,
        is_my_turn,
        is_winner: game.winner == Some(viewer),
        can_forfeit: is_participant && !is_my_turn && game.can_forfeit,
    }
}

/// Reads one game and, for active games, its remaining move time.
///
/// A failed `getTimeRemaining` read leaves the timeout unknown instead of
/// failing the whole game.
pub async fn load_game_view(
    contract: &dyn GameContract,
    game_id: u64,
    block: Option<u64>,
) -> Result<GameView> {
    let raw = contract.game(game_id, block).await?;
    if raw.player_one.is_zero() {
        return Err(AppError::NotFound(format!("Game {} not found", game_id)));
    }

    let time_remaining = if derive_status(&raw) == GameStatus::Active {
        match contract.time_remaining(game_id, block).await {
            Ok(secs) => Some(secs),
            Err(err) => {
                tracing::debug!("getTimeRemaining({}) failed: {}", game_id, err);
                None
            }
        }
    } else {
        None
    };

    Ok(build_game_view(game_id, &raw, time_remaining))
}

async fn load_reward(
    contract: &dyn GameContract,
    game: &GameView,
    viewer: &ViewerState,
    block: u64,
) -> Option<RewardStatus> {
    if game.status != GameStatus::Finished {
        return None;
    }
    let (claimable, claimed) = tokio::join!(
        contract.claimable_reward(game.game_id, Some(block)),
        contract.reward_claimed(game.game_id, Some(block)),
    );
    match (claimable, claimed) {
        (Ok(claimable), Ok(claimed)) => Some(RewardStatus {
            claimable,
            claimed,
            can_claim: viewer.is_winner && !claimed && !claimable.is_zero(),
        }),
        (Err(err), _) | (_, Err(err)) => {
            tracing::debug!("reward read for game {} failed: {}", game.game_id, err);
            None
        }
    }
}

/// Reads game, board and reward state pinned to a single block.
pub async fn load_snapshot(
    contract: &dyn GameContract,
    game_id: u64,
    viewer: Option<Address>,
) -> Result<GameSnapshot> {
    let block = contract.block_number().await?;
    let game = load_game_view(contract, game_id, Some(block)).await?;
    let viewer_flags = viewer_state(&game, viewer);

    let (board, reward) = tokio::join!(
        load_board(contract, game_id, game.board_size, Some(block)),
        load_reward(contract, &game, &viewer_flags, block),
    );
    let board = match board {
        BoardRead::Fresh(board) => Some(board),
        BoardRead::RateLimited => None,
    };

    Ok(GameSnapshot {
        block_number: block,
        game,
        board,
        viewer: viewer_flags,
        reward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{addr, raw_game, MockContract};
    use crate::models::ContractGameStatus;

    #[test]
    fn status_grid() {
        let p1 = addr(0x01);
        let p2 = addr(0x02);
        let cases = [
            (Address::zero(), ContractGameStatus::Active, GameStatus::Waiting),
            (p2, ContractGameStatus::Active, GameStatus::Active),
            (Address::zero(), ContractGameStatus::Ended, GameStatus::Finished),
            (p2, ContractGameStatus::Ended, GameStatus::Finished),
            (Address::zero(), ContractGameStatus::Forfeited, GameStatus::Finished),
            (p2, ContractGameStatus::Forfeited, GameStatus::Finished),
        ];
        for (player_two, contract_status, expected) in cases {
            let raw = raw_game(p1, player_two, contract_status);
            assert_eq!(derive_status(&raw), expected, "{:?}/{:?}", player_two, contract_status);
        }
    }

    #[test]
    fn current_player_follows_turn_flag() {
        let mut raw = raw_game(addr(0x01), addr(0x02), ContractGameStatus::Active);
        raw.is_player_one_turn = false;
        let view = build_game_view(1, &raw, Some(100));
        assert_eq!(view.current_player, Some(addr(0x02)));

        let viewer = viewer_state(&view, Some(addr(0x02)));
        assert!(viewer.is_my_turn);
        assert!(viewer.is_participant);
        assert!(!viewer_state(&view, Some(addr(0x01))).is_my_turn);
    }

    #[test]
    fn zero_winner_on_finished_game_is_draw() {
        let raw = raw_game(addr(0x01), addr(0x02), ContractGameStatus::Ended);
        let view = build_game_view(4, &raw, None);
        assert!(view.is_draw);
        assert_eq!(view.winner, None);
        assert!(!viewer_state(&view, Some(addr(0x01))).is_winner);
    }

    #[test]
    fn winner_is_attributed() {
        let mut raw = raw_game(addr(0x01), addr(0x02), ContractGameStatus::Forfeited);
        raw.winner = addr(0x02);
        let view = build_game_view(4, &raw, None);
        assert!(!view.is_draw);
        assert!(viewer_state(&view, Some(addr(0x02))).is_winner);
    }

    #[test]
    fn can_forfeit_only_when_timer_hits_zero() {
        let mut raw = raw_game(addr(0x01), addr(0x02), ContractGameStatus::Active);
        raw.is_player_one_turn = false;
        let expired = build_game_view(2, &raw, Some(0));
        assert!(expired.can_forfeit);
        assert!(viewer_state(&expired, Some(addr(0x01))).can_forfeit);
        assert!(!viewer_state(&expired, Some(addr(0x02))).can_forfeit);

        let running = build_game_view(2, &raw, Some(60));
        assert!(!running.can_forfeit);
        let unknown = build_game_view(2, &raw, None);
        assert!(!unknown.can_forfeit);
    }

    #[test]
    fn waiting_game_ignores_time_remaining_and_allows_join() {
        let raw = raw_game(addr(0x01), Address::zero(), ContractGameStatus::Active);
        let view = build_game_view(3, &raw, Some(0));
        assert_eq!(view.time_remaining, None);
        assert!(!view.can_forfeit);
        assert!(viewer_state(&view, Some(addr(0x05))).can_join);
        assert!(!viewer_state(&view, Some(addr(0x01))).can_join);
        assert_eq!(viewer_state(&view, None), ViewerState::default());
    }

    #[tokio::test]
    async fn load_game_view_tolerates_time_remaining_failure() {
        let contract = MockContract::new()
            .with_game(0, raw_game(addr(0x01), addr(0x02), ContractGameStatus::Active));
        let view = load_game_view(&contract, 0, None).await.unwrap();
        assert_eq!(view.status, GameStatus::Active);
        assert_eq!(view.time_remaining, None);
        assert!(!view.can_forfeit);
    }

    #[tokio::test]
    async fn expired_timer_enables_forfeit_for_waiting_player() {
        let contract = MockContract::new()
            .with_game(6, raw_game(addr(0x01), addr(0x02), ContractGameStatus::Active))
            .with_time_remaining(6, 0);
        let view = load_game_view(&contract, 6, None).await.unwrap();
        assert_eq!(view.time_remaining, Some(0));
        assert!(viewer_state(&view, Some(addr(0x02))).can_forfeit);
        assert!(!viewer_state(&view, Some(addr(0x01))).can_forfeit);
    }

    #[tokio::test]
    async fn load_game_view_reports_missing_game() {
        let contract = MockContract::new()
            .with_game(0, raw_game(Address::zero(), Address::zero(), ContractGameStatus::Active));
        assert!(matches!(
            load_game_view(&contract, 0, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_reads_are_pinned_to_one_block() {
        let mut raw = raw_game(addr(0x01), addr(0x02), ContractGameStatus::Ended);
        raw.winner = addr(0x01);
        let contract = MockContract::new().with_game(7, raw);

        let snapshot = load_snapshot(&contract, 7, Some(addr(0x01))).await.unwrap();
        assert_eq!(snapshot.block_number, 100);
        let pinned = contract.pinned_blocks.lock().unwrap().clone();
        assert!(!pinned.is_empty());
        assert!(pinned.iter().all(|block| *block == Some(100)));

        let reward = snapshot.reward.unwrap();
        assert!(reward.can_claim);
        assert!(snapshot.board.is_some());
    }
}
