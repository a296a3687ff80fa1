use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{games::ViewerQuery, require_transactor, resolve_viewer, AppState};
use crate::{
    constants::DEFAULT_BOARD_SIZE,
    error::{AppError, Result},
    models::{
        ApiResponse, ChallengeDirection, ChallengeStatus, ChallengeView, PlayerChallenges,
        TxOutcome,
    },
    services::challenge_view::{filter_challenges, load_challenge, load_player_challenges},
    utils::{parse_address, parse_optional_address},
};

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeListQuery {
    pub player: Option<String>,
    pub tab: Option<ChallengeDirection>,
    pub status: Option<ChallengeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub challenged: String,
    pub bet_amount: String,
    pub token_address: Option<String>,
    pub board_size: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptChallengeRequest {
    pub move_index: u32,
}

/// GET /api/v1/challenges
///
/// Counts cover every challenge of the player; `tab` and `status` only narrow the list.
pub async fn list_challenges(
    State(state): State<AppState>,
    Query(query): Query<ChallengeListQuery>,
) -> Result<Json<ApiResponse<PlayerChallenges>>> {
    let player = resolve_viewer(&state, query.player.as_deref())?
        .ok_or_else(|| AppError::BadRequest("player is required".to_string()))?;

    let mut result = load_player_challenges(state.contract.as_ref(), player).await?;
    result.challenges = filter_challenges(&result.challenges, query.tab, query.status);
    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/v1/challenges/{challenge_id}
pub async fn get_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<u64>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<ChallengeView>>> {
    let viewer = resolve_viewer(&state, query.viewer.as_deref())?;
    let challenge = load_challenge(state.contract.as_ref(), challenge_id, viewer).await?;
    if challenge.challenger.is_zero() {
        return Err(AppError::NotFound(format!(
            "Challenge {} not found",
            challenge_id
        )));
    }
    Ok(Json(ApiResponse::success(challenge)))
}

/// POST /api/v1/challenges
pub async fn create_challenge(
    State(state): State<AppState>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let challenged = parse_address(&req.challenged)?;
    let token = parse_optional_address(req.token_address.as_deref())?.unwrap_or_default();

    let outcome = transactor
        .create_challenge(
            challenged,
            &req.bet_amount,
            token,
            req.board_size.unwrap_or(DEFAULT_BOARD_SIZE),
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/challenges/{challenge_id}/accept
pub async fn accept_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<u64>,
    Json(req): Json<AcceptChallengeRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let outcome = transactor
        .accept_challenge(challenge_id, req.move_index)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
