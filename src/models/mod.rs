// src/models/mod.rs
pub mod challenge;
pub mod contract;
pub mod game;
pub mod response;

pub use challenge::{ChallengeDirection, ChallengeStatus, ChallengeView, PlayerChallenges, RawChallenge};
pub use contract::{ContractSettings, PlayerView, RawPlayer, TokenBalance, TokenInfo};
pub use game::{
    Board, BoardRead, ContractGameStatus, GameBuckets, GameSnapshot, GameStatus, GameView, Mark,
    RawGame, RewardStatus, ViewerState,
};
pub use response::{ApiResponse, TxOutcome};
