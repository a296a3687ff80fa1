use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::{games::ViewerQuery, require_transactor, resolve_viewer, AppState};
use crate::{
    error::{AppError, Result},
    models::{ApiResponse, ContractSettings, TxOutcome},
    services::AdminAction,
    utils::shorten_address,
};

#[derive(Debug, Serialize)]
pub struct AdminSettingsResponse {
    #[serde(flatten)]
    pub settings: ContractSettings,
    pub is_admin: bool,
    pub is_owner: bool,
}

/// GET /api/v1/admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<AdminSettingsResponse>>> {
    let viewer = resolve_viewer(&state, query.viewer.as_deref())?;
    let settings = state.contract.settings().await?;

    let is_owner = viewer == Some(settings.owner) && !settings.owner.is_zero();
    let is_admin = match viewer {
        Some(account) => state.contract.is_admin(account).await?,
        None => false,
    };

    Ok(Json(ApiResponse::success(AdminSettingsResponse {
        settings,
        is_admin,
        is_owner,
    })))
}

/// POST /api/v1/admin/actions
///
/// The signer must be an admin or the owner; the contract still has the last word.
pub async fn execute_action(
    State(state): State<AppState>,
    Json(action): Json<AdminAction>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let transactor = require_transactor(&state)?;
    let signer = transactor.signer_address();

    let (is_admin, settings) = tokio::try_join!(
        state.contract.is_admin(signer),
        state.contract.settings()
    )?;
    if !is_admin && settings.owner != signer {
        return Err(AppError::BadRequest(format!(
            "{} is not an admin of the game contract",
            shorten_address(&signer)
        )));
    }

    tracing::info!("Admin action {:?} by {}", action, shorten_address(&signer));
    let outcome = transactor.admin(&action).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state_with;
    use crate::chain::mock::{addr, MockContract};

    async fn settings_for(byte: u8) -> AdminSettingsResponse {
        let query = ViewerQuery {
            viewer: Some(format!("{:#x}", addr(byte))),
        };
        let Json(response) = get_settings(State(state_with(MockContract::new())), Query(query))
            .await
            .unwrap();
        response.data
    }

    #[tokio::test]
    async fn owner_and_admin_flags() {
        let owner = settings_for(0x0a).await;
        assert!(owner.is_owner);
        assert!(owner.is_admin);
        assert_eq!(owner.settings.platform_fee_percent, 5);

        let stranger = settings_for(0x33).await;
        assert!(!stranger.is_owner);
        assert!(!stranger.is_admin);
    }

    #[tokio::test]
    async fn settings_serialize_flat() {
        let json = serde_json::to_value(settings_for(0x0a).await).unwrap();
        assert_eq!(json["k_factor"], 32);
        assert_eq!(json["is_owner"], true);
    }

    #[test]
    fn actions_are_tagged_by_name() {
        let action: AdminAction =
            serde_json::from_str(r#"{"action":"set_platform_fee","percent":3}"#).unwrap();
        assert!(matches!(action, AdminAction::SetPlatformFee { percent: 3 }));
        let pause: AdminAction = serde_json::from_str(r#"{"action":"pause"}"#).unwrap();
        assert!(matches!(pause, AdminAction::Pause));
    }
}
