use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use ethers::providers::{Http, Provider};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod chain;
mod config;
mod constants;
mod error;
mod models;
mod services;
mod utils;
mod websocket;

use chain::{EvmContractClient, GameContract};
use config::Config;
use constants::API_VERSION;
use services::{GameTransactor, NetworkGuard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blocxtactoe_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting BlOcXTacToe gateway");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);
    tracing::info!("Game contract: {}", config.contract_address);

    // One provider shared by reads, balance lookups and the signer
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())?;
    let shared_provider = Arc::new(provider.clone());

    let contract: Arc<dyn GameContract> =
        Arc::new(EvmContractClient::from_config(&config, shared_provider.clone())?);
    let transactor = GameTransactor::from_config(&config, provider, contract.clone())?.map(Arc::new);
    if let Some(transactor) = &transactor {
        tracing::info!("Signer: {:#x}", transactor.signer_address());
    }

    let network = Arc::new(NetworkGuard::new(contract.clone(), config.chain_id));

    let app_state = api::AppState {
        config: config.clone(),
        provider: shared_provider,
        contract,
        transactor,
        network: network.clone(),
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    tokio::spawn(services::start_background_services(network));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/api/v1/network", get(api::health::network_config))
        // Games
        .route(
            "/api/v1/games",
            get(api::games::list_games).post(api::games::create_game),
        )
        .route("/api/v1/games/{game_id}", get(api::games::get_game))
        .route("/api/v1/games/{game_id}/board", get(api::games::get_board))
        .route("/api/v1/games/{game_id}/join", post(api::games::join_game))
        .route("/api/v1/games/{game_id}/play", post(api::games::play))
        .route(
            "/api/v1/games/{game_id}/forfeit",
            post(api::games::forfeit_game),
        )
        .route(
            "/api/v1/games/{game_id}/claim",
            post(api::games::claim_reward),
        )
        // Challenges
        .route(
            "/api/v1/challenges",
            get(api::challenges::list_challenges).post(api::challenges::create_challenge),
        )
        .route(
            "/api/v1/challenges/{challenge_id}",
            get(api::challenges::get_challenge),
        )
        .route(
            "/api/v1/challenges/{challenge_id}/accept",
            post(api::challenges::accept_challenge),
        )
        // Players
        .route("/api/v1/players/register", post(api::players::register))
        .route("/api/v1/players/{address}", get(api::players::get_player))
        // Tokens
        .route("/api/v1/tokens", get(api::tokens::list_tokens))
        .route(
            "/api/v1/tokens/{token}/balance/{owner}",
            get(api::tokens::get_balance),
        )
        // Admin
        .route("/api/v1/admin/settings", get(api::admin::get_settings))
        .route("/api/v1/admin/actions", post(api::admin::execute_action))
        // WebSocket endpoints
        .route("/ws/games/{game_id}", get(websocket::games::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
