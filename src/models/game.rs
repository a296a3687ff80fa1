use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::utils::serialize_u256_decimal;

/// Status enum as stored by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractGameStatus {
    Active,
    Ended,
    Forfeited,
}

impl ContractGameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContractGameStatus::Ended | ContractGameStatus::Forfeited)
    }
}

impl TryFrom<u8> for ContractGameStatus {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ContractGameStatus::Active),
            1 => Ok(ContractGameStatus::Ended),
            2 => Ok(ContractGameStatus::Forfeited),
            other => Err(AppError::Decode(format!("unknown game status {}", other))),
        }
    }
}

/// Status shown to players, derived from the contract status and the seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Finished,
}

/// Decoded `getGame` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGame {
    pub player_one: Address,
    pub player_two: Address,
    pub bet_amount: U256,
    pub token_address: Address,
    pub is_player_one_turn: bool,
    pub winner: Address,
    pub last_move_timestamp: U256,
    pub status: ContractGameStatus,
    pub board_size: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub game_id: u64,
    pub player_one: Address,
    pub player_two: Option<Address>,
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub bet_amount: U256,
    pub bet_amount_formatted: String,
    pub token_address: Address,
    pub is_native_bet: bool,
    pub status: GameStatus,
    pub contract_status: ContractGameStatus,
    pub current_player: Option<Address>,
    pub winner: Option<Address>,
    pub is_draw: bool,
    pub time_remaining: Option<u64>,
    pub can_forfeit: bool,
    pub board_size: u8,
    pub last_move_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Per-viewer flags for a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewerState {
    pub is_player_one: bool,
    pub is_player_two: bool,
    pub is_participant: bool,
    pub can_join: bool,
    pub is_my_turn: bool,
    pub is_winner: bool,
    pub can_forfeit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub size: u8,
    pub cells: Vec<Option<Mark>>,
    /// Cells whose read failed; they are reported as empty.
    pub unreadable: Vec<usize>,
}

impl Board {
    pub fn empty(size: u8) -> Self {
        let cells = usize::from(size) * usize::from(size);
        Self {
            size,
            cells: vec![None; cells],
            unreadable: Vec::new(),
        }
    }

    pub fn unreadable(size: u8) -> Self {
        let mut board = Board::empty(size);
        board.unreadable = (0..board.cells.len()).collect();
        board
    }

    pub fn cell(&self, index: usize) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.cell(index).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardRead {
    Fresh(Board),
    /// The RPC throttled the batch; callers should keep what they had.
    RateLimited,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewardStatus {
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub claimable: U256,
    pub claimed: bool,
    pub can_claim: bool,
}

/// Game, board and reward state read at one block.
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub block_number: u64,
    pub game: GameView,
    /// `None` when the board read was rate limited.
    pub board: Option<Board>,
    pub viewer: ViewerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GameBuckets {
    pub open: Vec<GameView>,
    pub my_active: Vec<GameView>,
    pub my_past: Vec<GameView>,
    pub total: usize,
}
