use axum::{
    extract::{Path, State},
    Json,
};
use ethers::types::Address;
use futures_util::future::join_all;

use super::AppState;
use crate::{
    chain::erc20::fetch_token_balance,
    error::Result,
    models::{ApiResponse, TokenBalance, TokenInfo},
    utils::{parse_address, shorten_address},
};

const NATIVE_TOKEN_NAME: &str = "CELO";

/// GET /api/v1/tokens
///
/// A failed name lookup falls back to the shortened address.
pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<TokenInfo>>>> {
    let mut tokens = state.contract.supported_tokens().await?;
    if !tokens.iter().any(|token| token.is_zero()) {
        tokens.insert(0, Address::zero());
    }

    let contract = state.contract.as_ref();
    let infos = join_all(tokens.into_iter().map(|address| async move {
        if address.is_zero() {
            return TokenInfo {
                address,
                name: NATIVE_TOKEN_NAME.to_string(),
                is_native: true,
            };
        }
        let name = match contract.token_name(address).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => shorten_address(&address),
            Err(err) => {
                tracing::debug!("getTokenName({:#x}) failed: {}", address, err);
                shorten_address(&address)
            }
        };
        TokenInfo {
            address,
            name,
            is_native: false,
        }
    }))
    .await;

    Ok(Json(ApiResponse::success(infos)))
}

/// GET /api/v1/tokens/{token}/balance/{owner}
pub async fn get_balance(
    State(state): State<AppState>,
    Path((token, owner)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TokenBalance>>> {
    let token = parse_address(&token)?;
    let owner = parse_address(&owner)?;
    let balance = fetch_token_balance(state.provider.clone(), token, owner).await?;
    Ok(Json(ApiResponse::success(balance)))
}
