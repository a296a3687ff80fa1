use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{require_transactor, resolve_viewer, AppState};
use crate::{
    constants::DEFAULT_BOARD_SIZE,
    error::{AppError, Result},
    models::{ApiResponse, Board, BoardRead, GameBuckets, GameSnapshot, TxOutcome},
    services::{
        board::load_board,
        challenge_view::{challenge_game_ids, load_player_challenges},
        game_view::load_snapshot,
        games_loader::bucket_games,
        GamesLoader, LoaderPolicy,
    },
    utils::{parse_optional_address, shorten_address},
};

#[derive(Debug, Default, Deserialize)]
pub struct ViewerQuery {
    pub viewer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    /// Decimal amount in whole tokens, e.g. "0.01".
    pub bet_amount: String,
    pub move_index: u32,
    pub token_address: Option<String>,
    pub board_size: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub move_index: u32,
}

/// GET /api/v1/games
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<GameBuckets>>> {
    let viewer = resolve_viewer(&state, query.viewer.as_deref())?;
    let loader = GamesLoader::new(state.contract.clone(), LoaderPolicy::from_config(&state.config));
    let games = loader.load_all().await?;

    let challenge_games = match viewer {
        Some(player) => match load_player_challenges(state.contract.as_ref(), player).await {
            Ok(challenges) => challenge_game_ids(&challenges.challenges),
            Err(err) => {
                tracing::warn!(
                    "Challenge list for {} unavailable: {}",
                    shorten_address(&player),
                    err
                );
                HashSet::new()
            }
        },
        None => HashSet::new(),
    };

    Ok(Json(ApiResponse::success(bucket_games(
        games,
        viewer,
        &challenge_games,
    ))))
}

/// GET /api/v1/games/{game_id}
pub async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<GameSnapshot>>> {
    let viewer = resolve_viewer(&state, query.viewer.as_deref())?;
    let snapshot = load_snapshot(state.contract.as_ref(), game_id, viewer).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// GET /api/v1/games/{game_id}/board
pub async fn get_board(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
) -> Result<Json<ApiResponse<Board>>> {
    let game = state.contract.game(game_id, None).await?;
    if game.player_one.is_zero() {
        return Err(AppError::NotFound(format!("Game {} not found", game_id)));
    }
    match load_board(state.contract.as_ref(), game_id, game.board_size, None).await {
        BoardRead::Fresh(board) => Ok(Json(ApiResponse::success(board))),
        BoardRead::RateLimited => Err(AppError::RateLimited(format!(
            "Board of game {} could not be read, retry shortly",
            game_id
        ))),
    }
}

/// POST /api/v1/games
pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let token = parse_optional_address(req.token_address.as_deref())?.unwrap_or_default();
    let board_size = req.board_size.unwrap_or(DEFAULT_BOARD_SIZE);

    let outcome = transactor
        .create_game(&req.bet_amount, req.move_index, token, board_size)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/games/{game_id}/join
pub async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let outcome = transactor.join_game(game_id, req.move_index).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/games/{game_id}/play
pub async fn play(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let outcome = transactor.play(game_id, req.move_index).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/games/{game_id}/forfeit
pub async fn forfeit_game(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let outcome = transactor.forfeit_game(game_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/games/{game_id}/claim
pub async fn claim_reward(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let outcome = transactor.claim_reward(game_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
