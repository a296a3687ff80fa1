use crate::chain::GameContract;
use crate::models::{Board, BoardRead, Mark};

/// Maps raw `gameBoards` values onto marks. Failed or out-of-range cells
/// become empty and are listed in `unreadable`.
pub fn board_from_cells(size: u8, values: &[Option<u8>]) -> Board {
    let mut board = Board::empty(size);
    for index in 0..board.cells.len() {
        match values.get(index).copied().flatten() {
            Some(0) => {}
            Some(1) => board.cells[index] = Some(Mark::X),
            Some(2) => board.cells[index] = Some(Mark::O),
            _ => board.unreadable.push(index),
        }
    }
    board
}

/// Reads every cell of a game in one multicall.
///
/// # Returns
/// * `BoardRead::RateLimited` when the RPC throttled the batch.
/// * An all-empty board with every cell unreadable for any other batch failure.
pub async fn load_board(
    contract: &dyn GameContract,
    game_id: u64,
    board_size: u8,
    block: Option<u64>,
) -> BoardRead {
    match contract.board_cells(game_id, board_size, block).await {
        Ok(values) => {
            let board = board_from_cells(board_size, &values);
            if !board.unreadable.is_empty() {
                tracing::debug!(
                    "game {} board has {} unreadable cells",
                    game_id,
                    board.unreadable.len()
                );
            }
            BoardRead::Fresh(board)
        }
        Err(err) if err.is_rate_limited() => {
            tracing::warn!("Board read for game {} rate limited: {}", game_id, err);
            BoardRead::RateLimited
        }
        Err(err) => {
            tracing::warn!("Board read for game {} failed: {}", game_id, err);
            BoardRead::Fresh(Board::unreadable(board_size))
        }
    }
}
