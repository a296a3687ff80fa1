use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::Token;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, TransactionRequest, H256, U256, U64};
use serde::Deserialize;
use tokio::time::sleep;

use super::board::load_board;
use super::game_view::derive_status;
use crate::chain::abi::{self, encode_call, uint};
use crate::chain::erc20::Erc20;
use crate::chain::events::{find_game_id, GameIdEvent};
use crate::chain::GameContract;
use crate::config::Config;
use crate::error::{looks_like_rate_limit, revert_reason, AppError, Result};
use crate::models::{Board, BoardRead, GameStatus, RawChallenge, RawGame, TxOutcome};
use crate::utils::{
    parse_address, parse_bet_amount, validate_board_size, validate_move_index, validate_username,
};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A validated contract write, ready to be signed.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub action: &'static str,
    pub calldata: Vec<u8>,
    /// Sent as msg.value; only set for native-token bets.
    pub value: Option<U256>,
    /// ERC-20 allowance the contract needs before the call.
    pub approval: Option<(Address, U256)>,
    pub game_id_event: Option<GameIdEvent>,
}

impl PreparedCall {
    fn new(action: &'static str, signature: &str, args: &[Token]) -> Self {
        Self {
            action,
            calldata: encode_call(signature, args),
            value: None,
            approval: None,
            game_id_event: None,
        }
    }

    // Native bets travel as value, token bets need an allowance.
    fn with_bet(mut self, token: Address, amount: U256) -> Self {
        if token.is_zero() {
            self.value = Some(amount);
        } else {
            self.approval = Some((token, amount));
        }
        self
    }

    fn emitting(mut self, event: GameIdEvent) -> Self {
        self.game_id_event = Some(event);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    AddAdmin { account: String },
    RemoveAdmin { account: String },
    SetMoveTimeout { seconds: u64 },
    SetPlatformFee { percent: u64 },
    SetPlatformFeeRecipient { recipient: String },
    SetKFactor { k_factor: u64 },
    SetSupportedToken { token: String, supported: bool, name: String },
    Pause,
    Unpause,
}

pub fn prepare_register_player(username: &str) -> Result<PreparedCall> {
    let username = validate_username(username)?;
    Ok(PreparedCall::new(
        "registerPlayer",
        abi::REGISTER_PLAYER,
        &[Token::String(username)],
    ))
}

pub fn prepare_create_game(
    bet_amount: &str,
    move_index: u32,
    token: Address,
    board_size: u8,
) -> Result<PreparedCall> {
    validate_board_size(board_size)?;
    let bet = parse_bet_amount(bet_amount)?;
    validate_move_index(move_index, board_size)?;

    Ok(PreparedCall::new(
        "createGame",
        abi::CREATE_GAME,
        &[
            Token::Uint(bet),
            uint(u64::from(move_index)),
            Token::Address(token),
            uint(u64::from(board_size)),
        ],
    )
    .with_bet(token, bet)
    .emitting(GameIdEvent::GameCreated))
}

/// Bet and token come from the game itself.
pub fn prepare_join_game(
    game_id: u64,
    move_index: u32,
    game: &RawGame,
    signer: Address,
) -> Result<PreparedCall> {
    if derive_status(game) != GameStatus::Waiting {
        return Err(AppError::BadRequest(format!(
            "Game {} is not waiting for a second player",
            game_id
        )));
    }
    if game.player_one == signer {
        return Err(AppError::BadRequest("Cannot join your own game".to_string()));
    }
    validate_move_index(move_index, game.board_size)?;

    Ok(PreparedCall::new(
        "joinGame",
        abi::JOIN_GAME,
        &[uint(game_id), uint(u64::from(move_index))],
    )
    .with_bet(game.token_address, game.bet_amount))
}

pub fn prepare_play(
    game_id: u64,
    move_index: u32,
    game: &RawGame,
    board: Option<&Board>,
    signer: Address,
) -> Result<PreparedCall> {
    if derive_status(game) != GameStatus::Active {
        return Err(AppError::BadRequest(format!("Game {} is not active", game_id)));
    }
    let current = if game.is_player_one_turn {
        game.player_one
    } else {
        game.player_two
    };
    if current != signer {
        return Err(AppError::BadRequest("It's not your turn".to_string()));
    }
    validate_move_index(move_index, game.board_size)?;
    if board.map_or(false, |board| board.is_occupied(move_index as usize)) {
        return Err(AppError::BadRequest(format!(
            "Cell {} is already occupied",
            move_index
        )));
    }

    Ok(PreparedCall::new(
        "play",
        abi::PLAY,
        &[uint(game_id), uint(u64::from(move_index))],
    ))
}

pub fn prepare_forfeit(game_id: u64, game: &RawGame, signer: Address) -> Result<PreparedCall> {
    if derive_status(game) != GameStatus::Active {
        return Err(AppError::BadRequest(format!("Game {} is not active", game_id)));
    }
    if game.player_one != signer && game.player_two != signer {
        return Err(AppError::BadRequest("Only players can forfeit a game".to_string()));
    }
    let current = if game.is_player_one_turn {
        game.player_one
    } else {
        game.player_two
    };
    if current == signer {
        return Err(AppError::BadRequest(
            "Cannot claim a timeout on your own turn".to_string(),
        ));
    }
    Ok(PreparedCall::new("forfeitGame", abi::FORFEIT_GAME, &[uint(game_id)]))
}

pub fn prepare_claim_reward(
    game_id: u64,
    game: &RawGame,
    already_claimed: bool,
    signer: Address,
) -> Result<PreparedCall> {
    if derive_status(game) != GameStatus::Finished {
        return Err(AppError::BadRequest(format!("Game {} is not finished", game_id)));
    }
    if game.winner != signer {
        return Err(AppError::BadRequest("Only the winner can claim the reward".to_string()));
    }
    if already_claimed {
        return Err(AppError::BadRequest("Reward already claimed".to_string()));
    }
    Ok(PreparedCall::new("claimReward", abi::CLAIM_REWARD, &[uint(game_id)]))
}

pub fn prepare_create_challenge(
    challenged: Address,
    signer: Address,
    bet_amount: &str,
    token: Address,
    board_size: u8,
) -> Result<PreparedCall> {
    if challenged.is_zero() {
        return Err(AppError::BadRequest("Challenged address is required".to_string()));
    }
    if challenged == signer {
        return Err(AppError::BadRequest("Cannot challenge yourself".to_string()));
    }
    validate_board_size(board_size)?;
    let bet = parse_bet_amount(bet_amount)?;

    Ok(PreparedCall::new(
        "createChallenge",
        abi::CREATE_CHALLENGE,
        &[
            Token::Address(challenged),
            Token::Uint(bet),
            Token::Address(token),
            uint(u64::from(board_size)),
        ],
    )
    .with_bet(token, bet))
}

pub fn prepare_accept_challenge(
    challenge_id: u64,
    move_index: u32,
    challenge: &RawChallenge,
    signer: Address,
) -> Result<PreparedCall> {
    if challenge.accepted {
        return Err(AppError::BadRequest(format!(
            "Challenge {} was already accepted",
            challenge_id
        )));
    }
    if challenge.challenged != signer {
        return Err(AppError::BadRequest(
            "Only the challenged player can accept".to_string(),
        ));
    }
    validate_move_index(move_index, challenge.board_size)?;

    Ok(PreparedCall::new(
        "acceptChallenge",
        abi::ACCEPT_CHALLENGE,
        &[uint(challenge_id), uint(u64::from(move_index))],
    )
    .with_bet(challenge.token_address, challenge.bet_amount)
    .emitting(GameIdEvent::ChallengeAccepted))
}

pub fn prepare_admin(action: &AdminAction) -> Result<PreparedCall> {
    let call = match action {
        AdminAction::AddAdmin { account } => PreparedCall::new(
            "addAdmin",
            abi::ADD_ADMIN,
            &[Token::Address(parse_address(account)?)],
        ),
        AdminAction::RemoveAdmin { account } => PreparedCall::new(
            "removeAdmin",
            abi::REMOVE_ADMIN,
            &[Token::Address(parse_address(account)?)],
        ),
        AdminAction::SetMoveTimeout { seconds } => {
            if *seconds == 0 {
                return Err(AppError::BadRequest("Move timeout must be > 0".to_string()));
            }
            PreparedCall::new("setMoveTimeout", abi::SET_MOVE_TIMEOUT, &[uint(*seconds)])
        }
        AdminAction::SetPlatformFee { percent } => {
            if *percent > 100 {
                return Err(AppError::BadRequest("Platform fee must be <= 100".to_string()));
            }
            PreparedCall::new("setPlatformFee", abi::SET_PLATFORM_FEE, &[uint(*percent)])
        }
        AdminAction::SetPlatformFeeRecipient { recipient } => PreparedCall::new(
            "setPlatformFeeRecipient",
            abi::SET_PLATFORM_FEE_RECIPIENT,
            &[Token::Address(parse_address(recipient)?)],
        ),
        AdminAction::SetKFactor { k_factor } => {
            if *k_factor == 0 {
                return Err(AppError::BadRequest("K factor must be > 0".to_string()));
            }
            PreparedCall::new("setKFactor", abi::SET_K_FACTOR, &[uint(*k_factor)])
        }
        AdminAction::SetSupportedToken {
            token,
            supported,
            name,
        } => {
            if *supported && name.trim().is_empty() {
                return Err(AppError::BadRequest("Token name is required".to_string()));
            }
            PreparedCall::new(
                "setSupportedToken",
                abi::SET_SUPPORTED_TOKEN,
                &[
                    Token::Address(parse_address(token)?),
                    Token::Bool(*supported),
                    Token::String(name.trim().to_string()),
                ],
            )
        }
        AdminAction::Pause => PreparedCall::new("pause", abi::PAUSE, &[]),
        AdminAction::Unpause => PreparedCall::new("unpause", abi::UNPAUSE, &[]),
    };
    Ok(call)
}

// Rate limiting stays distinguishable; everything else is a failed transaction.
fn tx_error(action: &str, message: String) -> AppError {
    if looks_like_rate_limit(&message) {
        return AppError::RateLimited(message);
    }
    match revert_reason(&message) {
        Some(reason) => AppError::TransactionFailed(format!("{} reverted: {}", action, reason)),
        None => AppError::TransactionFailed(format!("{} failed: {}", action, message)),
    }
}

/// Signs and submits contract writes with the configured wallet.
pub struct GameTransactor {
    client: Arc<SignerClient>,
    reader: Arc<dyn GameContract>,
    contract: Address,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl GameTransactor {
    /// Returns `Ok(None)` when no signing key is configured.
    pub fn from_config(
        config: &Config,
        provider: Provider<Http>,
        reader: Arc<dyn GameContract>,
    ) -> Result<Option<Self>> {
        let Some(private_key) = config.signer_private_key.as_deref() else {
            return Ok(None);
        };

        let wallet = LocalWallet::from_str(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| AppError::Internal(format!("Invalid SIGNER_PRIVATE_KEY: {}", e)))?
            .with_chain_id(config.chain_id);
        let contract = parse_address(&config.contract_address)?;

        Ok(Some(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            reader,
            contract,
            receipt_timeout: Duration::from_millis(config.transaction_timeout_ms),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms.max(1)),
        }))
    }

    pub fn signer_address(&self) -> Address {
        self.client.address()
    }

    pub async fn register_player(&self, username: &str) -> Result<TxOutcome> {
        self.execute(prepare_register_player(username)?).await
    }

    pub async fn create_game(
        &self,
        bet_amount: &str,
        move_index: u32,
        token: Address,
        board_size: u8,
    ) -> Result<TxOutcome> {
        self.execute(prepare_create_game(bet_amount, move_index, token, board_size)?)
            .await
    }

    pub async fn join_game(&self, game_id: u64, move_index: u32) -> Result<TxOutcome> {
        let game = self.reader.game(game_id, None).await?;
        self.execute(prepare_join_game(game_id, move_index, &game, self.signer_address())?)
            .await
    }

    pub async fn play(&self, game_id: u64, move_index: u32) -> Result<TxOutcome> {
        let game = self.reader.game(game_id, None).await?;
        let board = match load_board(self.reader.as_ref(), game_id, game.board_size, None).await {
            BoardRead::Fresh(board) => Some(board),
            BoardRead::RateLimited => None,
        };
        let call = prepare_play(game_id, move_index, &game, board.as_ref(), self.signer_address())?;
        self.execute(call).await
    }

    pub async fn forfeit_game(&self, game_id: u64) -> Result<TxOutcome> {
        let game = self.reader.game(game_id, None).await?;
        self.execute(prepare_forfeit(game_id, &game, self.signer_address())?)
            .await
    }

    pub async fn claim_reward(&self, game_id: u64) -> Result<TxOutcome> {
        let game = self.reader.game(game_id, None).await?;
        let claimed = self.reader.reward_claimed(game_id, None).await?;
        self.execute(prepare_claim_reward(game_id, &game, claimed, self.signer_address())?)
            .await
    }

    pub async fn create_challenge(
        &self,
        challenged: Address,
        bet_amount: &str,
        token: Address,
        board_size: u8,
    ) -> Result<TxOutcome> {
        let call = prepare_create_challenge(
            challenged,
            self.signer_address(),
            bet_amount,
            token,
            board_size,
        )?;
        self.execute(call).await
    }

    pub async fn accept_challenge(&self, challenge_id: u64, move_index: u32) -> Result<TxOutcome> {
        let challenge = self.reader.challenge(challenge_id).await?;
        let call =
            prepare_accept_challenge(challenge_id, move_index, &challenge, self.signer_address())?;
        self.execute(call).await
    }

    pub async fn admin(&self, action: &AdminAction) -> Result<TxOutcome> {
        self.execute(prepare_admin(action)?).await
    }

    pub async fn needs_approval(&self, token: Address, amount: U256) -> Result<bool> {
        if token.is_zero() {
            return Ok(false);
        }
        let erc20 = Erc20::new(token, self.client.clone());
        let allowance = erc20
            .allowance(self.signer_address(), self.contract)
            .call()
            .await
            .map_err(|e| AppError::from_rpc(e.to_string()))?;
        Ok(allowance < amount)
    }

    /// Approves the game contract for `amount` and waits for the receipt.
    pub async fn approve_token(&self, token: Address, amount: U256) -> Result<H256> {
        let erc20 = Erc20::new(token, self.client.clone());
        let call = erc20.approve(self.contract, amount);
        tracing::info!("Approving {} of token {:#x} for {:#x}", amount, token, self.contract);
        let pending = call
            .send()
            .await
            .map_err(|e| tx_error("approve", e.to_string()))?;
        let tx_hash = *pending;
        self.wait_for_receipt("approve", tx_hash).await?;
        Ok(tx_hash)
    }

    pub async fn execute(&self, call: PreparedCall) -> Result<TxOutcome> {
        let mut approval_tx_hash = None;
        if let Some((token, amount)) = call.approval {
            if self.needs_approval(token, amount).await? {
                approval_tx_hash = Some(self.approve_token(token, amount).await?);
            }
        }

        let mut request = TransactionRequest::new()
            .to(self.contract)
            .data(call.calldata.clone());
        if let Some(value) = call.value {
            request = request.value(value);
        }

        tracing::info!("Submitting {} from {:#x}", call.action, self.signer_address());
        tracing::debug!(
            "{} calldata selector 0x{}, {} bytes",
            call.action,
            hex::encode(call.calldata.get(..4).unwrap_or_default()),
            call.calldata.len()
        );
        let pending = self
            .client
            .send_transaction(request, None)
            .await
            .map_err(|e| tx_error(call.action, e.to_string()))?;
        let tx_hash = *pending;
        tracing::info!("{} submitted: {:#x}", call.action, tx_hash);

        let receipt = self.wait_for_receipt(call.action, tx_hash).await?;
        let game_id = call
            .game_id_event
            .and_then(|event| find_game_id(&receipt.logs, self.contract, event));
        if call.game_id_event.is_some() && game_id.is_none() {
            tracing::warn!("{} confirmed but no game id event found in {:#x}", call.action, tx_hash);
        }

        Ok(TxOutcome {
            action: call.action.to_string(),
            tx_hash,
            block_number: receipt.block_number.map(|number| number.as_u64()),
            approval_tx_hash,
            game_id,
        })
    }

    async fn wait_for_receipt(&self, action: &str, tx_hash: H256) -> Result<TransactionReceipt> {
        let poll_attempts = (self.receipt_timeout.as_millis() / self.receipt_poll_interval.as_millis())
            .max(1) as usize;
        let mut last_error = String::from("receipt not yet available");

        for attempt in 0..poll_attempts {
            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status != Some(U64::from(1)) {
                        return Err(AppError::TransactionFailed(format!(
                            "{} reverted in {:#x}",
                            action, tx_hash
                        )));
                    }
                    tracing::info!("{} confirmed: {:#x}", action, tx_hash);
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(err) => last_error = err.to_string(),
            }
            if attempt + 1 < poll_attempts {
                sleep(self.receipt_poll_interval).await;
            }
        }

        Err(AppError::TransactionFailed(format!(
            "{} not confirmed within {}s ({:#x}): {}",
            action,
            self.receipt_timeout.as_secs(),
            tx_hash,
            last_error
        )))
    }
}
