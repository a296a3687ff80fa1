use axum::{extract::State, Json};
use ethers::types::Address;
use serde::Serialize;

use super::AppState;
use crate::constants::{API_VERSION, CELO_CHAIN_ID, CELO_CHAIN_NAME};
use crate::error::Result;
use crate::models::ApiResponse;
use crate::services::NetworkStatus;
use crate::utils::parse_address;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub api_version: String,
    pub network: NetworkStatus,
    pub signer: Option<Address>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let network = state.network.refresh().await;
    let status = if network.connected_chain_id.is_none() {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: API_VERSION.to_string(),
        network,
        signer: state
            .transactor
            .as_ref()
            .map(|transactor| transactor.signer_address()),
    })
}

/// Client-facing connection settings.
#[derive(Debug, Serialize)]
pub struct NetworkConfigResponse {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: String,
    pub contract_address: Address,
    pub multicall_address: Address,
    pub walletconnect_project_id: String,
    pub testnet: bool,
    pub polling_interval_ms: u64,
}

/// GET /api/v1/network
pub async fn network_config(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NetworkConfigResponse>>> {
    let config = &state.config;
    let chain_name = if config.chain_id == CELO_CHAIN_ID {
        CELO_CHAIN_NAME.to_string()
    } else {
        format!("chain-{}", config.chain_id)
    };

    Ok(Json(ApiResponse::success(NetworkConfigResponse {
        chain_id: config.chain_id,
        chain_name,
        rpc_url: config.rpc_url.clone(),
        contract_address: parse_address(&config.contract_address)?,
        multicall_address: parse_address(&config.multicall_address)?,
        walletconnect_project_id: config.walletconnect_project_id.clone(),
        testnet: config.is_testnet(),
        polling_interval_ms: config.polling_interval_ms,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state_with;
    use crate::chain::mock::MockContract;

    #[tokio::test]
    async fn health_reports_network_and_missing_signer() {
        let state = state_with(MockContract::new());
        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "ok");
        assert!(!health.network.chain_mismatch);
        assert!(health.signer.is_none());
    }

    #[tokio::test]
    async fn network_config_names_celo() {
        let state = state_with(MockContract::new());
        let Json(response) = network_config(State(state)).await.unwrap();
        assert_eq!(response.data.chain_id, 42220);
        assert_eq!(response.data.chain_name, "celo");
        assert_eq!(response.data.walletconnect_project_id, "test-project");
        assert!(!response.data.testnet);
    }

    #[tokio::test]
    async fn development_on_mainnet_is_not_testnet() {
        let mut state = state_with(MockContract::new());
        state.config.environment = "development".to_string();
        let Json(response) = network_config(State(state.clone())).await.unwrap();
        assert!(!response.data.testnet);

        state.config.chain_id = 44787;
        let Json(response) = network_config(State(state)).await.unwrap();
        assert!(response.data.testnet);
        assert_eq!(response.data.chain_name, "chain-44787");
    }
}
