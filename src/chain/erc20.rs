use std::sync::Arc;

use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};

use crate::constants::NATIVE_TOKEN_DECIMALS;
use crate::error::{AppError, Result};
use crate::models::TokenBalance;

ethers::contract::abigen!(
    Erc20,
    r#"[
        function balanceOf(address) view returns (uint256)
        function decimals() view returns (uint8)
        function allowance(address,address) view returns (uint256)
        function approve(address,uint256) returns (bool)
    ]"#
);

/// Fetches the balance of `owner` for `token`; the zero address reads the native balance.
pub async fn fetch_token_balance(
    provider: Arc<Provider<Http>>,
    token: Address,
    owner: Address,
) -> Result<TokenBalance> {
    if token.is_zero() {
        let raw = ethers::providers::Middleware::get_balance(provider.as_ref(), owner, None)
            .await
            .map_err(|e| AppError::from_rpc(e.to_string()))?;
        return Ok(balance(token, owner, raw, NATIVE_TOKEN_DECIMALS));
    }

    let erc20 = Erc20::new(token, provider);
    let raw = erc20
        .balance_of(owner)
        .call()
        .await
        .map_err(|e| AppError::from_rpc(e.to_string()))?;
    let decimals = match erc20.decimals().call().await {
        Ok(decimals) => decimals,
        Err(err) => {
            tracing::debug!("decimals() failed for {:#x}, assuming 18: {}", token, err);
            NATIVE_TOKEN_DECIMALS
        }
    };
    Ok(balance(token, owner, raw, decimals))
}

fn balance(token: Address, owner: Address, raw: U256, decimals: u8) -> TokenBalance {
    TokenBalance {
        token,
        owner,
        raw,
        decimals,
        formatted: format_units(raw, decimals),
    }
}

/// Formats a raw amount with `decimals`, trimming trailing zeros.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let formatted = ethers::utils::format_units(raw, u32::from(decimals))
        .unwrap_or_else(|_| raw.to_string());
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_units_trims_trailing_zeros() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_units(one_and_half, 18), "1.5");
        assert_eq!(format_units(U256::from(1_000_000u64), 6), "1");
        assert_eq!(format_units(U256::zero(), 18), "0");
    }
}
