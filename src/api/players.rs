use axum::{
    extract::{Path, State},
    Json,
};
use ethers::types::Address;
use serde::Deserialize;

use super::{require_transactor, AppState};
use crate::{
    error::{AppError, Result},
    models::{ApiResponse, PlayerView, RawPlayer, TxOutcome},
    utils::{parse_address, u256_to_u64},
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

fn player_view(address: Address, raw: RawPlayer) -> Result<PlayerView> {
    Ok(PlayerView {
        address,
        registered: raw.registered,
        wins: u256_to_u64(raw.wins, "wins")?,
        losses: u256_to_u64(raw.losses, "losses")?,
        draws: u256_to_u64(raw.draws, "draws")?,
        total_games: u256_to_u64(raw.total_games, "totalGames")?,
        rating: u256_to_u64(raw.rating, "rating")?,
        username: raw.username,
    })
}

/// GET /api/v1/players/{address}
///
/// Unregistered addresses are returned with `registered: false` rather than 404.
pub async fn get_player(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<PlayerView>>> {
    let address = parse_address(&address)?;
    let raw = state.contract.player(address).await?;
    Ok(Json(ApiResponse::success(player_view(address, raw)?)))
}

/// POST /api/v1/players/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;

    let existing = state.contract.player(transactor.signer_address()).await?;
    if existing.registered {
        return Err(AppError::BadRequest(format!(
            "Already registered as {}",
            existing.username
        )));
    }

    let outcome = transactor.register_player(&req.username).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
