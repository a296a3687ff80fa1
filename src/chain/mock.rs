use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use super::client::GameContract;
use crate::error::{AppError, Result};
use crate::models::{ContractGameStatus, ContractSettings, RawChallenge, RawGame, RawPlayer};

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn raw_game(player_one: Address, player_two: Address, status: ContractGameStatus) -> RawGame {
    RawGame {
        player_one,
        player_two,
        bet_amount: U256::from(10u64).pow(U256::from(16u64)),
        token_address: Address::zero(),
        is_player_one_turn: true,
        winner: Address::zero(),
        last_move_timestamp: U256::from(1_700_000_000u64),
        status,
        board_size: 3,
    }
}

pub fn raw_challenge(challenger: Address, challenged: Address, accepted: bool, game_id: u64) -> RawChallenge {
    RawChallenge {
        challenger,
        challenger_username: "alice".to_string(),
        challenged,
        challenged_username: "bob".to_string(),
        bet_amount: U256::from(1_000u64),
        token_address: Address::zero(),
        board_size: 3,
        timestamp: U256::from(1_700_000_000u64),
        accepted,
        game_id: U256::from(game_id),
    }
}

#[derive(Clone)]
pub enum BoardBehavior {
    Cells(Vec<Option<u8>>),
    RateLimited,
    Broken,
}

/// In-memory contract used by service tests.
pub struct MockContract {
    pub games: Mutex<HashMap<u64, RawGame>>,
    pub failing_games: Mutex<HashSet<u64>>,
    /// Games that fail this many times before succeeding.
    pub flaky_games: Mutex<HashMap<u64, u32>>,
    pub time_remaining: Mutex<HashMap<u64, u64>>,
    pub boards: Mutex<HashMap<u64, BoardBehavior>>,
    pub challenges: Mutex<HashMap<u64, RawChallenge>>,
    pub player_challenges: Mutex<HashMap<Address, Vec<u64>>>,
    pub players: Mutex<HashMap<Address, RawPlayer>>,
    pub rewards_claimed: Mutex<HashSet<u64>>,
    pub block: AtomicU64,
    pub game_calls: AtomicU32,
    pub pinned_blocks: Mutex<Vec<Option<u64>>>,
}

impl MockContract {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
            failing_games: Mutex::new(HashSet::new()),
            flaky_games: Mutex::new(HashMap::new()),
            time_remaining: Mutex::new(HashMap::new()),
            boards: Mutex::new(HashMap::new()),
            challenges: Mutex::new(HashMap::new()),
            player_challenges: Mutex::new(HashMap::new()),
            players: Mutex::new(HashMap::new()),
            rewards_claimed: Mutex::new(HashSet::new()),
            block: AtomicU64::new(100),
            game_calls: AtomicU32::new(0),
            pinned_blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_game(self, game_id: u64, game: RawGame) -> Self {
        self.games.lock().unwrap().insert(game_id, game);
        self
    }

    pub fn set_game(&self, game_id: u64, game: RawGame) {
        self.games.lock().unwrap().insert(game_id, game);
    }

    pub fn with_failing_game(self, game_id: u64) -> Self {
        self.failing_games.lock().unwrap().insert(game_id);
        self
    }

    pub fn with_flaky_game(self, game_id: u64, failures: u32) -> Self {
        self.flaky_games.lock().unwrap().insert(game_id, failures);
        self
    }

    pub fn with_time_remaining(self, game_id: u64, secs: u64) -> Self {
        self.time_remaining.lock().unwrap().insert(game_id, secs);
        self
    }

    pub fn with_board(self, game_id: u64, behavior: BoardBehavior) -> Self {
        self.boards.lock().unwrap().insert(game_id, behavior);
        self
    }

    pub fn with_challenge(self, challenge_id: u64, challenge: RawChallenge) -> Self {
        for party in [challenge.challenger, challenge.challenged] {
            self.player_challenges
                .lock()
                .unwrap()
                .entry(party)
                .or_default()
                .push(challenge_id);
        }
        self.challenges.lock().unwrap().insert(challenge_id, challenge);
        self
    }
}

#[async_trait]
impl GameContract for MockContract {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(crate::constants::CELO_CHAIN_ID)
    }

    async fn latest_game_id(&self) -> Result<u64> {
        let games = self.games.lock().unwrap();
        let failing = self.failing_games.lock().unwrap();
        let max_game = games.keys().max().map(|id| id + 1).unwrap_or(0);
        let max_failing = failing.iter().max().map(|id| id + 1).unwrap_or(0);
        Ok(max_game.max(max_failing))
    }

    async fn game(&self, game_id: u64, block: Option<u64>) -> Result<RawGame> {
        self.game_calls.fetch_add(1, Ordering::SeqCst);
        self.pinned_blocks.lock().unwrap().push(block);
        if self.failing_games.lock().unwrap().contains(&game_id) {
            return Err(AppError::BlockchainRPC(format!("getGame({}) reverted", game_id)));
        }
        {
            let mut flaky = self.flaky_games.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&game_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::RateLimited("429".to_string()));
                }
            }
        }
        self.games
            .lock()
            .unwrap()
            .get(&game_id)
            .cloned()
            .ok_or_else(|| AppError::Decode(format!("getGame({}): empty return data", game_id)))
    }

    async fn time_remaining(&self, game_id: u64, _block: Option<u64>) -> Result<u64> {
        self.time_remaining
            .lock()
            .unwrap()
            .get(&game_id)
            .copied()
            .ok_or_else(|| AppError::BlockchainRPC("getTimeRemaining failed".to_string()))
    }

    async fn board_cells(
        &self,
        game_id: u64,
        board_size: u8,
        block: Option<u64>,
    ) -> Result<Vec<Option<u8>>> {
        self.pinned_blocks.lock().unwrap().push(block);
        let cells = usize::from(board_size) * usize::from(board_size);
        match self.boards.lock().unwrap().get(&game_id).cloned() {
            Some(BoardBehavior::Cells(values)) => Ok(values),
            Some(BoardBehavior::RateLimited) => Err(AppError::RateLimited(
                "(code: -32016, message: rate limit exceeded)".to_string(),
            )),
            Some(BoardBehavior::Broken) => Err(AppError::BlockchainRPC("connection refused".to_string())),
            None => Ok(vec![Some(0); cells]),
        }
    }

    async fn challenge(&self, challenge_id: u64) -> Result<RawChallenge> {
        self.challenges
            .lock()
            .unwrap()
            .get(&challenge_id)
            .cloned()
            .ok_or_else(|| AppError::BlockchainRPC("getChallenge failed".to_string()))
    }

    async fn player_challenges(&self, player: Address) -> Result<Vec<u64>> {
        Ok(self
            .player_challenges
            .lock()
            .unwrap()
            .get(&player)
            .cloned()
            .unwrap_or_default())
    }

    async fn player(&self, player: Address) -> Result<RawPlayer> {
        Ok(self
            .players
            .lock()
            .unwrap()
            .get(&player)
            .cloned()
            .unwrap_or(RawPlayer {
                username: String::new(),
                wins: U256::zero(),
                losses: U256::zero(),
                draws: U256::zero(),
                total_games: U256::zero(),
                rating: U256::zero(),
                registered: false,
            }))
    }

    async fn supported_tokens(&self) -> Result<Vec<Address>> {
        Ok(vec![Address::zero(), addr(0xc0)])
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        if token == addr(0xc0) {
            Ok("cUSD".to_string())
        } else {
            Err(AppError::BlockchainRPC("getTokenName failed".to_string()))
        }
    }

    async fn claimable_reward(&self, _game_id: u64, _block: Option<u64>) -> Result<U256> {
        Ok(U256::from(2_000u64))
    }

    async fn reward_claimed(&self, game_id: u64, _block: Option<u64>) -> Result<bool> {
        Ok(self.rewards_claimed.lock().unwrap().contains(&game_id))
    }

    async fn settings(&self) -> Result<ContractSettings> {
        Ok(ContractSettings {
            move_timeout_secs: crate::constants::DEFAULT_MOVE_TIMEOUT_SECS,
            platform_fee_percent: 5,
            platform_fee_recipient: addr(0xfe),
            k_factor: 32,
            paused: false,
            owner: addr(0x0a),
        })
    }

    async fn is_admin(&self, account: Address) -> Result<bool> {
        Ok(account == addr(0x0a))
    }
}
