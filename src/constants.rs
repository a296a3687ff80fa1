/// Application constants

// Network
pub const CELO_CHAIN_ID: u64 = 42220;
pub const CELO_CHAIN_NAME: &str = "celo";
pub const DEFAULT_RPC_URL: &str = "https://forno.celo.org";
pub const NETWORK_CHECK_INTERVAL_SECS: u64 = 300;

// Contract addresses
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x2fD7aDE08AbD28DC0b33357Ff28A1ecB31a3790B";
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

// Game rules
pub const VALID_BOARD_SIZES: [u8; 3] = [3, 5, 7];
pub const DEFAULT_BOARD_SIZE: u8 = 3;
pub const DEFAULT_MOVE_TIMEOUT_SECS: u64 = 86_400; // 24 hours
pub const MIN_USERNAME_LENGTH: usize = 1;
pub const MAX_USERNAME_LENGTH: usize = 32;
pub const NATIVE_TOKEN_DECIMALS: u8 = 18;

// Polling & transactions
pub const POLLING_INTERVAL_MS: u64 = 5_000;
pub const TRANSACTION_TIMEOUT_MS: u64 = 120_000;
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1_500;

// Games loader
pub const LOADER_BATCH_SIZE: usize = 5;
pub const LOADER_BATCH_DELAY_MS: u64 = 100;
pub const LOADER_MAX_ATTEMPTS: u32 = 3;
pub const LOADER_BACKOFF_BASE_MS: u64 = 500;

// RPC guard
pub const RPC_MAX_INFLIGHT_DEFAULT: usize = 8;
pub const RPC_BREAKER_THRESHOLD: u32 = 3;
pub const RPC_BREAKER_BASE_SECS: u64 = 2;
pub const RPC_BREAKER_MAX_SECS: u64 = 45;

// API version
pub const API_VERSION: &str = "v1";

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
