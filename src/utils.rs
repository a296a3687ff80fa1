// Utility modules

use std::str::FromStr;

use ethers::types::{Address, U256};
use serde::Serializer;

use crate::{
    constants::{MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH, VALID_BOARD_SIZES},
    error::{AppError, Result},
};

/// Parses a hex address, rejecting anything that is not 20 bytes.
pub fn parse_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(AppError::BadRequest(format!("Invalid address: {}", raw)));
    }
    Address::from_str(trimmed).map_err(|_| AppError::BadRequest(format!("Invalid address: {}", raw)))
}

pub fn parse_optional_address(raw: Option<&str>) -> Result<Option<Address>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_address(value).map(Some),
        None => Ok(None),
    }
}

pub fn non_zero(address: Address) -> Option<Address> {
    if address.is_zero() {
        None
    } else {
        Some(address)
    }
}

pub fn format_address(address: &Address) -> String {
    format!("{:#x}", address)
}

pub fn shorten_address(address: &Address) -> String {
    let full = format_address(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Parses a decimal ether amount ("0.01") into wei, requiring it to be positive.
pub fn parse_bet_amount(raw: &str) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Bet amount is required".to_string()));
    }
    let wei = ethers::utils::parse_ether(trimmed)
        .map_err(|_| AppError::BadRequest(format!("Invalid bet amount: {}", raw)))?;
    if wei.is_zero() {
        return Err(AppError::BadRequest("Bet amount must be greater than 0".to_string()));
    }
    Ok(wei)
}

pub fn validate_board_size(board_size: u8) -> Result<()> {
    if VALID_BOARD_SIZES.contains(&board_size) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Board size must be one of {:?}, got {}",
            VALID_BOARD_SIZES, board_size
        )))
    }
}

pub fn validate_move_index(move_index: u32, board_size: u8) -> Result<()> {
    let cells = u32::from(board_size) * u32::from(board_size);
    if move_index >= cells {
        return Err(AppError::BadRequest(format!(
            "Move index {} is outside a {}x{} board",
            move_index, board_size, board_size
        )));
    }
    Ok(())
}

/// Trims and length-checks a username, returning the value to submit.
pub fn validate_username(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    if length < MIN_USERNAME_LENGTH {
        return Err(AppError::BadRequest("Username cannot be empty".to_string()));
    }
    if length > MAX_USERNAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

pub fn u256_to_u64(value: U256, field: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(AppError::Decode(format!("{} does not fit in u64: {}", field, value)));
    }
    Ok(value.as_u64())
}

pub fn serialize_u256_decimal<S>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_accepts_checksummed_and_lowercase() {
        let a = parse_address("0x2fD7aDE08AbD28DC0b33357Ff28A1ecB31a3790B").unwrap();
        let b = parse_address("0x2fd7ade08abd28dc0b33357ff28a1ecb31a3790b").unwrap();
        assert_eq!(a, b);
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("2fd7ade08abd28dc0b33357ff28a1ecb31a3790b").is_err());
    }

    #[test]
    fn parse_optional_address_treats_blank_as_none() {
        assert_eq!(parse_optional_address(Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_address(None).unwrap(), None);
        assert!(parse_optional_address(Some("0xzz")).is_err());
    }

    #[test]
    fn shorten_address_keeps_prefix_and_suffix() {
        let addr = parse_address("0x2fd7ade08abd28dc0b33357ff28a1ecb31a3790b").unwrap();
        assert_eq!(shorten_address(&addr), "0x2fd7...790b");
    }

    #[test]
    fn bet_amount_must_be_positive_decimal() {
        assert_eq!(
            parse_bet_amount("0.01").unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
        assert!(parse_bet_amount("0").is_err());
        assert!(parse_bet_amount("").is_err());
        assert!(parse_bet_amount("abc").is_err());
    }

    #[test]
    fn board_size_and_move_index_rules() {
        assert!(validate_board_size(3).is_ok());
        assert!(validate_board_size(7).is_ok());
        assert!(validate_board_size(4).is_err());
        assert!(validate_move_index(8, 3).is_ok());
        assert!(validate_move_index(9, 3).is_err());
        assert!(validate_move_index(48, 7).is_ok());
    }

    #[test]
    fn username_is_trimmed_and_bounded() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn u256_to_u64_rejects_overflow() {
        assert_eq!(u256_to_u64(U256::from(42u64), "id").unwrap(), 42);
        assert!(u256_to_u64(U256::MAX, "id").is_err());
    }
}
