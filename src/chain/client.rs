use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{transaction::eip2718::TypedTransaction, Address, BlockId, TransactionRequest, U256};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

use super::abi::{self, encode_call, uint};
use super::multicall::{decode_aggregate3, encode_aggregate3, u8_results, Call3};
use crate::config::Config;
use crate::constants::{
    RPC_BREAKER_BASE_SECS, RPC_BREAKER_MAX_SECS, RPC_BREAKER_THRESHOLD,
};
use crate::error::{AppError, Result};
use crate::models::{ContractSettings, RawChallenge, RawGame, RawPlayer};
use crate::utils::{parse_address, u256_to_u64};

/// Read access to the game contract.
///
/// `block` pins a read to a block number; `None` reads at latest.
#[async_trait]
pub trait GameContract: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
    async fn chain_id(&self) -> Result<u64>;
    async fn latest_game_id(&self) -> Result<u64>;
    async fn game(&self, game_id: u64, block: Option<u64>) -> Result<RawGame>;
    async fn time_remaining(&self, game_id: u64, block: Option<u64>) -> Result<u64>;
    /// Raw cell values in index order. `None` marks a cell whose sub-call failed.
    /// An `Err` means the whole batch failed.
    async fn board_cells(
        &self,
        game_id: u64,
        board_size: u8,
        block: Option<u64>,
    ) -> Result<Vec<Option<u8>>>;
    async fn challenge(&self, challenge_id: u64) -> Result<RawChallenge>;
    async fn player_challenges(&self, player: Address) -> Result<Vec<u64>>;
    async fn player(&self, player: Address) -> Result<RawPlayer>;
    async fn supported_tokens(&self) -> Result<Vec<Address>>;
    async fn token_name(&self, token: Address) -> Result<String>;
    async fn claimable_reward(&self, game_id: u64, block: Option<u64>) -> Result<U256>;
    async fn reward_claimed(&self, game_id: u64, block: Option<u64>) -> Result<bool>;
    async fn settings(&self) -> Result<ContractSettings>;
    async fn is_admin(&self, account: Address) -> Result<bool>;
}

#[derive(Default)]
struct CircuitBreaker {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

// Internal helper that checks conditions for `looks_like_transient_rpc_error`.
fn looks_like_transient_rpc_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("-32016")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("gateway")
        || lower.contains("temporarily unavailable")
        || lower.contains("connection reset")
}

fn breaker_backoff(failures: u32) -> Duration {
    if failures <= RPC_BREAKER_THRESHOLD {
        return Duration::from_secs(RPC_BREAKER_BASE_SECS);
    }
    let exponent = (failures - RPC_BREAKER_THRESHOLD).min(6);
    let secs = RPC_BREAKER_BASE_SECS.saturating_mul(1_u64 << exponent);
    Duration::from_secs(secs.min(RPC_BREAKER_MAX_SECS))
}

/// Bounds in-flight RPC calls and backs off after repeated transient failures.
pub struct RpcGuard {
    semaphore: Arc<Semaphore>,
    breaker: RwLock<CircuitBreaker>,
}

impl RpcGuard {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_inflight.max(1))),
            breaker: RwLock::new(CircuitBreaker::default()),
        }
    }

    async fn preflight(&self, method: &str) -> Result<OwnedSemaphorePermit> {
        let now = Instant::now();
        {
            let guard = self.breaker.read().await;
            if let Some(until) = guard.open_until {
                if until > now {
                    return Err(AppError::RateLimited(format!(
                        "{} skipped: RPC circuit open for {}ms",
                        method,
                        until.duration_since(now).as_millis()
                    )));
                }
            }
        }

        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("RPC semaphore closed: {}", e)))
    }

    async fn record<T>(&self, method: &str, outcome: &Result<T>) {
        match outcome {
            Ok(_) => {
                let mut guard = self.breaker.write().await;
                if guard.consecutive_failures != 0 || guard.open_until.is_some() {
                    guard.consecutive_failures = 0;
                    guard.open_until = None;
                }
            }
            Err(AppError::BlockchainRPC(text)) | Err(AppError::RateLimited(text)) => {
                if !looks_like_transient_rpc_error(text) {
                    return;
                }
                let mut guard = self.breaker.write().await;
                guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);
                if guard.consecutive_failures < RPC_BREAKER_THRESHOLD {
                    return;
                }
                let backoff = breaker_backoff(guard.consecutive_failures);
                guard.open_until = Some(Instant::now() + backoff);
                tracing::warn!(
                    "{} transient RPC failure opened circuit backoff={}s failures={}",
                    method,
                    backoff.as_secs(),
                    guard.consecutive_failures
                );
            }
            Err(_) => {}
        }
    }
}

/// `GameContract` over JSON-RPC `eth_call`.
pub struct EvmContractClient {
    provider: Arc<Provider<Http>>,
    contract: Address,
    multicall: Address,
    guard: RpcGuard,
}

impl EvmContractClient {
    pub fn new(
        provider: Arc<Provider<Http>>,
        contract: Address,
        multicall: Address,
        max_inflight: usize,
    ) -> Self {
        Self {
            provider,
            contract,
            multicall,
            guard: RpcGuard::new(max_inflight),
        }
    }

    pub fn from_config(config: &Config, provider: Arc<Provider<Http>>) -> Result<Self> {
        let contract = parse_address(&config.contract_address)?;
        let multicall = parse_address(&config.multicall_address)?;
        Ok(Self::new(provider, contract, multicall, config.rpc_max_inflight))
    }

    async fn eth_call(
        &self,
        method: &'static str,
        to: Address,
        data: Vec<u8>,
        block: Option<u64>,
    ) -> Result<Vec<u8>> {
        let _permit = self.guard.preflight(method).await?;
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let outcome = self
            .provider
            .call(&tx, block.map(BlockId::from))
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| AppError::from_rpc(format!("{}: {}", method, e)));
        self.guard.record(method, &outcome).await;
        outcome
    }

    async fn read(
        &self,
        method: &'static str,
        signature: &str,
        args: &[Token],
        block: Option<u64>,
    ) -> Result<Vec<u8>> {
        self.eth_call(method, self.contract, encode_call(signature, args), block)
            .await
    }
}

#[async_trait]
impl GameContract for EvmContractClient {
    async fn block_number(&self) -> Result<u64> {
        let _permit = self.guard.preflight("eth_blockNumber").await?;
        let outcome = self
            .provider
            .get_block_number()
            .await
            .map(|number| number.as_u64())
            .map_err(|e| AppError::from_rpc(e.to_string()));
        self.guard.record("eth_blockNumber", &outcome).await;
        outcome
    }

    async fn chain_id(&self) -> Result<u64> {
        let _permit = self.guard.preflight("eth_chainId").await?;
        let outcome = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| AppError::from_rpc(e.to_string()));
        self.guard.record("eth_chainId", &outcome).await;
        u256_to_u64(outcome?, "chainId")
    }

    async fn latest_game_id(&self) -> Result<u64> {
        let data = self.read("getLatestGameId", abi::GET_LATEST_GAME_ID, &[], None).await?;
        u256_to_u64(abi::decode_uint("getLatestGameId", &data)?, "latestGameId")
    }

    async fn game(&self, game_id: u64, block: Option<u64>) -> Result<RawGame> {
        let data = self.read("getGame", abi::GET_GAME, &[uint(game_id)], block).await?;
        abi::decode_game(&data)
    }

    async fn time_remaining(&self, game_id: u64, block: Option<u64>) -> Result<u64> {
        let data = self
            .read("getTimeRemaining", abi::GET_TIME_REMAINING, &[uint(game_id)], block)
            .await?;
        let remaining = abi::decode_uint("getTimeRemaining", &data)?;
        Ok(if remaining > U256::from(u64::MAX) {
            u64::MAX
        } else {
            remaining.as_u64()
        })
    }

    async fn board_cells(
        &self,
        game_id: u64,
        board_size: u8,
        block: Option<u64>,
    ) -> Result<Vec<Option<u8>>> {
        let cells = usize::from(board_size) * usize::from(board_size);
        let calls: Vec<Call3> = (0..cells)
            .map(|index| Call3 {
                target: self.contract,
                allow_failure: true,
                call_data: encode_call(abi::GAME_BOARDS, &[uint(game_id), uint(index as u64)]),
            })
            .collect();

        let data = self
            .eth_call("aggregate3", self.multicall, encode_aggregate3(&calls), block)
            .await?;
        let results = decode_aggregate3(&data, cells)?;
        Ok(u8_results("gameBoards", results))
    }

    async fn challenge(&self, challenge_id: u64) -> Result<RawChallenge> {
        let data = self
            .read("getChallenge", abi::GET_CHALLENGE, &[uint(challenge_id)], None)
            .await?;
        abi::decode_challenge(&data)
    }

    async fn player_challenges(&self, player: Address) -> Result<Vec<u64>> {
        let data = self
            .read(
                "getPlayerChallenges",
                abi::GET_PLAYER_CHALLENGES,
                &[Token::Address(player)],
                None,
            )
            .await?;
        abi::decode_uint_array("getPlayerChallenges", &data)?
            .into_iter()
            .map(|id| u256_to_u64(id, "challengeId"))
            .collect()
    }

    async fn player(&self, player: Address) -> Result<RawPlayer> {
        let data = self
            .read("getPlayer", abi::GET_PLAYER, &[Token::Address(player)], None)
            .await?;
        abi::decode_player(&data)
    }

    async fn supported_tokens(&self) -> Result<Vec<Address>> {
        let data = self
            .read("getSupportedTokens", abi::GET_SUPPORTED_TOKENS, &[], None)
            .await?;
        abi::decode_address_array("getSupportedTokens", &data)
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        let data = self
            .read("getTokenName", abi::GET_TOKEN_NAME, &[Token::Address(token)], None)
            .await?;
        abi::decode_string("getTokenName", &data)
    }

    async fn claimable_reward(&self, game_id: u64, block: Option<u64>) -> Result<U256> {
        let data = self
            .read("claimableRewards", abi::CLAIMABLE_REWARDS, &[uint(game_id)], block)
            .await?;
        abi::decode_uint("claimableRewards", &data)
    }

    async fn reward_claimed(&self, game_id: u64, block: Option<u64>) -> Result<bool> {
        let data = self
            .read("rewardClaimed", abi::REWARD_CLAIMED, &[uint(game_id)], block)
            .await?;
        abi::decode_bool("rewardClaimed", &data)
    }

    async fn settings(&self) -> Result<ContractSettings> {
        let (timeout, fee, recipient, k_factor, paused, owner) = tokio::try_join!(
            self.read("moveTimeout", abi::MOVE_TIMEOUT, &[], None),
            self.read("platformFeePercent", abi::PLATFORM_FEE_PERCENT, &[], None),
            self.read("platformFeeRecipient", abi::PLATFORM_FEE_RECIPIENT, &[], None),
            self.read("kFactor", abi::K_FACTOR, &[], None),
            self.read("paused", abi::PAUSED, &[], None),
            self.read("owner", abi::OWNER, &[], None),
        )?;

        Ok(ContractSettings {
            move_timeout_secs: u256_to_u64(abi::decode_uint("moveTimeout", &timeout)?, "moveTimeout")?,
            platform_fee_percent: u256_to_u64(
                abi::decode_uint("platformFeePercent", &fee)?,
                "platformFeePercent",
            )?,
            platform_fee_recipient: abi::decode_address("platformFeeRecipient", &recipient)?,
            k_factor: u256_to_u64(abi::decode_uint("kFactor", &k_factor)?, "kFactor")?,
            paused: abi::decode_bool("paused", &paused)?,
            owner: abi::decode_address("owner", &owner)?,
        })
    }

    async fn is_admin(&self, account: Address) -> Result<bool> {
        let data = self
            .read("admins", abi::ADMINS, &[Token::Address(account)], None)
            .await?;
        abi::decode_bool("admins", &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classifier_matches_throttling() {
        assert!(looks_like_transient_rpc_error("HTTP 429 Too Many Requests"));
        assert!(looks_like_transient_rpc_error("request timed out"));
        assert!(!looks_like_transient_rpc_error("execution reverted"));
    }

    #[test]
    fn breaker_backoff_grows_and_caps() {
        assert_eq!(breaker_backoff(1), Duration::from_secs(RPC_BREAKER_BASE_SECS));
        assert_eq!(breaker_backoff(4), Duration::from_secs(RPC_BREAKER_BASE_SECS * 2));
        assert_eq!(breaker_backoff(50), Duration::from_secs(RPC_BREAKER_MAX_SECS));
    }

    fn offline_client(max_inflight: usize) -> EvmContractClient {
        let provider = Provider::<Http>::try_from("http://127.0.0.1:9").unwrap();
        EvmContractClient::new(
            Arc::new(provider),
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            max_inflight,
        )
    }

    #[test]
    fn from_config_sizes_guard_from_config() {
        let mut config = crate::api::test_support::config();
        config.rpc_max_inflight = 3;
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str()).unwrap();
        let client = EvmContractClient::from_config(&config, Arc::new(provider)).unwrap();
        assert_eq!(client.guard.semaphore.available_permits(), 3);
    }

    #[tokio::test]
    async fn chain_id_respects_open_circuit() {
        let client = offline_client(1);
        let failure: Result<()> = Err(AppError::RateLimited("429".to_string()));
        for _ in 0..RPC_BREAKER_THRESHOLD {
            client.guard.record("eth_call", &failure).await;
        }
        match client.chain_id().await {
            Err(AppError::RateLimited(message)) => assert!(message.contains("eth_chainId skipped")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn guard_opens_after_repeated_transient_failures() {
        let guard = RpcGuard::new(2);
        let failure: Result<()> = Err(AppError::RateLimited("429".to_string()));
        for _ in 0..RPC_BREAKER_THRESHOLD {
            guard.record("eth_call", &failure).await;
        }
        let blocked = guard.preflight("eth_call").await;
        assert!(matches!(blocked, Err(AppError::RateLimited(_))));

        guard.record("eth_call", &Ok(())).await;
        assert!(guard.preflight("eth_call").await.is_ok());
    }

    #[tokio::test]
    async fn guard_ignores_non_transient_errors() {
        let guard = RpcGuard::new(1);
        let failure: Result<()> = Err(AppError::BlockchainRPC("execution reverted".to_string()));
        for _ in 0..10 {
            guard.record("eth_call", &failure).await;
        }
        assert!(guard.preflight("eth_call").await.is_ok());
    }
}
