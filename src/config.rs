use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::constants::{
    CELO_CHAIN_ID, DEFAULT_CONTRACT_ADDRESS, DEFAULT_RPC_URL, LOADER_BACKOFF_BASE_MS,
    LOADER_BATCH_DELAY_MS, LOADER_BATCH_SIZE, LOADER_MAX_ATTEMPTS, MULTICALL3_ADDRESS,
    POLLING_INTERVAL_MS, RECEIPT_POLL_INTERVAL_MS, RPC_MAX_INFLIGHT_DEFAULT,
    TRANSACTION_TIMEOUT_MS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Blockchain
    pub rpc_url: String,
    pub chain_id: u64,
    pub rpc_max_inflight: usize,

    // Contract Addresses
    pub contract_address: String,
    pub multicall_address: String,

    // Wallet
    pub signer_private_key: Option<String>,
    pub walletconnect_project_id: String,

    // Polling & transactions
    pub polling_interval_ms: u64,
    pub transaction_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,

    // Games loader
    pub loader_batch_size: usize,
    pub loader_batch_delay_ms: u64,
    pub loader_max_attempts: u32,
    pub loader_backoff_base_ms: u64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| CELO_CHAIN_ID.to_string())
                .parse()?,
            rpc_max_inflight: positive_env("RPC_MAX_INFLIGHT", RPC_MAX_INFLIGHT_DEFAULT),

            contract_address: first_env(&["CONTRACT_ADDRESS", "NEXT_PUBLIC_CONTRACT_ADDRESS"])
                .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string()),
            multicall_address: env::var("MULTICALL_ADDRESS")
                .unwrap_or_else(|_| MULTICALL3_ADDRESS.to_string()),

            signer_private_key: env::var("SIGNER_PRIVATE_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            walletconnect_project_id: first_env(&[
                "WALLETCONNECT_PROJECT_ID",
                "NEXT_PUBLIC_WALLETCONNECT_PROJECT_ID",
            ])
            .unwrap_or_default(),

            polling_interval_ms: positive_env("POLLING_INTERVAL_MS", POLLING_INTERVAL_MS),
            transaction_timeout_ms: positive_env("TRANSACTION_TIMEOUT_MS", TRANSACTION_TIMEOUT_MS),
            receipt_poll_interval_ms: positive_env(
                "RECEIPT_POLL_INTERVAL_MS",
                RECEIPT_POLL_INTERVAL_MS,
            ),

            loader_batch_size: positive_env("LOADER_BATCH_SIZE", LOADER_BATCH_SIZE),
            loader_batch_delay_ms: env::var("LOADER_BATCH_DELAY_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(LOADER_BATCH_DELAY_MS),
            loader_max_attempts: positive_env("LOADER_MAX_ATTEMPTS", LOADER_MAX_ATTEMPTS),
            loader_backoff_base_ms: env::var("LOADER_BACKOFF_BASE_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(LOADER_BACKOFF_BASE_MS),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("RPC_URL is empty");
        }
        url::Url::parse(&self.rpc_url)
            .map_err(|e| anyhow::anyhow!("RPC_URL is not a valid URL: {}", e))?;
        if self.chain_id == 0 {
            anyhow::bail!("CHAIN_ID must be > 0");
        }
        ethers::types::Address::from_str(&self.contract_address)
            .map_err(|_| anyhow::anyhow!("CONTRACT_ADDRESS is not a valid address"))?;
        ethers::types::Address::from_str(&self.multicall_address)
            .map_err(|_| anyhow::anyhow!("MULTICALL_ADDRESS is not a valid address"))?;

        if self.contract_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder game contract address");
        }
        if self.chain_id != CELO_CHAIN_ID {
            tracing::warn!(
                "Configured chain id {} differs from Celo mainnet ({})",
                self.chain_id,
                CELO_CHAIN_ID
            );
        }
        if self.signer_private_key.is_none() {
            tracing::warn!("SIGNER_PRIVATE_KEY not set; write endpoints are disabled");
        }
        if self.walletconnect_project_id.trim().is_empty() {
            tracing::warn!("WALLETCONNECT_PROJECT_ID is empty; WalletConnect clients will not pair");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    /// Anything other than Celo mainnet counts as a testnet, whatever `ENVIRONMENT` says.
    pub fn is_testnet(&self) -> bool {
        self.chain_id != CELO_CHAIN_ID
    }
}

// Returns the first non-empty variable among `names`.
fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn positive_env<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    parse_positive(env::var(name).ok().as_deref(), default)
}

fn parse_positive<T>(raw: Option<&str>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: CELO_CHAIN_ID,
            rpc_max_inflight: RPC_MAX_INFLIGHT_DEFAULT,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            multicall_address: MULTICALL3_ADDRESS.to_string(),
            signer_private_key: None,
            walletconnect_project_id: String::new(),
            polling_interval_ms: POLLING_INTERVAL_MS,
            transaction_timeout_ms: TRANSACTION_TIMEOUT_MS,
            receipt_poll_interval_ms: RECEIPT_POLL_INTERVAL_MS,
            loader_batch_size: LOADER_BATCH_SIZE,
            loader_batch_delay_ms: LOADER_BATCH_DELAY_MS,
            loader_max_attempts: LOADER_MAX_ATTEMPTS,
            loader_backoff_base_ms: LOADER_BACKOFF_BASE_MS,
            cors_allowed_origins: "*".to_string(),
        }
    }

    #[test]
    fn parse_positive_falls_back_on_zero_or_garbage() {
        assert_eq!(parse_positive(Some("7"), 5usize), 7);
        assert_eq!(parse_positive(Some("0"), 5usize), 5);
        assert_eq!(parse_positive(Some("abc"), 5usize), 5);
        assert_eq!(parse_positive::<u64>(None, 100), 100);
    }

    #[test]
    fn default_config_validates() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_contract_address() {
        let mut config = sample_config();
        config.contract_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn testnet_follows_chain_id_not_environment() {
        let mut config = sample_config();
        assert!(!config.is_testnet());

        config.environment = "testnet".to_string();
        assert!(!config.is_testnet());

        config.environment = "production".to_string();
        config.chain_id = 44787;
        assert!(config.is_testnet());
    }

    #[test]
    fn validate_rejects_bad_rpc_url() {
        let mut config = sample_config();
        config.rpc_url = "forno celo".to_string();
        assert!(config.validate().is_err());
    }
}
