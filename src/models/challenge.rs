use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::utils::serialize_u256_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeDirection {
    Incoming,
    Outgoing,
}

/// Decoded `getChallenge` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChallenge {
    pub challenger: Address,
    pub challenger_username: String,
    pub challenged: Address,
    pub challenged_username: String,
    pub bet_amount: U256,
    pub token_address: Address,
    pub board_size: u8,
    pub timestamp: U256,
    pub accepted: bool,
    pub game_id: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeView {
    pub challenge_id: u64,
    pub challenger: Address,
    pub challenger_username: String,
    pub challenged: Address,
    pub challenged_username: String,
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub bet_amount: U256,
    pub bet_amount_formatted: String,
    pub token_address: Address,
    pub is_native_bet: bool,
    pub board_size: u8,
    pub created_at: Option<DateTime<Utc>>,
    pub accepted: bool,
    pub game_id: Option<u64>,
    pub status: ChallengeStatus,
    pub direction: Option<ChallengeDirection>,
    pub can_accept: bool,
}

/// All challenges involving one player.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerChallenges {
    pub player: Address,
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub challenges: Vec<ChallengeView>,
}
