use ethers::types::{Address, U256};
use serde::Serialize;

use crate::utils::serialize_u256_decimal;

/// Decoded `getPlayer` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlayer {
    pub username: String,
    pub wins: U256,
    pub losses: U256,
    pub draws: U256,
    pub total_games: U256,
    pub rating: U256,
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub address: Address,
    pub username: String,
    pub registered: bool,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub total_games: u64,
    pub rating: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub is_native: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub token: Address,
    pub owner: Address,
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub raw: U256,
    pub decimals: u8,
    pub formatted: String,
}

/// Contract-wide settings shown on the admin page.
#[derive(Debug, Clone, Serialize)]
pub struct ContractSettings {
    pub move_timeout_secs: u64,
    pub platform_fee_percent: u64,
    pub platform_fee_recipient: Address,
    pub k_factor: u64,
    pub paused: bool,
    pub owner: Address,
}
