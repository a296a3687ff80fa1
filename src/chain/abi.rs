use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};

use crate::constants::DEFAULT_BOARD_SIZE;
use crate::error::{AppError, Result};
use crate::models::{ContractGameStatus, RawChallenge, RawGame, RawPlayer};
use crate::utils::validate_board_size;

// Reads
pub const GET_GAME: &str = "getGame(uint256)";
pub const GET_TIME_REMAINING: &str = "getTimeRemaining(uint256)";
pub const GAME_BOARDS: &str = "gameBoards(uint256,uint256)";
pub const GET_CHALLENGE: &str = "getChallenge(uint256)";
pub const GET_PLAYER_CHALLENGES: &str = "getPlayerChallenges(address)";
pub const GET_PLAYER: &str = "getPlayer(address)";
pub const GET_LATEST_GAME_ID: &str = "getLatestGameId()";
pub const GET_SUPPORTED_TOKENS: &str = "getSupportedTokens()";
pub const GET_TOKEN_NAME: &str = "getTokenName(address)";
pub const CLAIMABLE_REWARDS: &str = "claimableRewards(uint256)";
pub const REWARD_CLAIMED: &str = "rewardClaimed(uint256)";
pub const MOVE_TIMEOUT: &str = "moveTimeout()";
pub const PLATFORM_FEE_PERCENT: &str = "platformFeePercent()";
pub const PLATFORM_FEE_RECIPIENT: &str = "platformFeeRecipient()";
pub const K_FACTOR: &str = "kFactor()";
pub const PAUSED: &str = "paused()";
pub const OWNER: &str = "owner()";
pub const ADMINS: &str = "admins(address)";

// Writes
pub const REGISTER_PLAYER: &str = "registerPlayer(string)";
pub const CREATE_GAME: &str = "createGame(uint256,uint8,address,uint8)";
pub const JOIN_GAME: &str = "joinGame(uint256,uint8)";
pub const PLAY: &str = "play(uint256,uint8)";
pub const FORFEIT_GAME: &str = "forfeitGame(uint256)";
pub const CLAIM_REWARD: &str = "claimReward(uint256)";
pub const CREATE_CHALLENGE: &str = "createChallenge(address,uint256,address,uint8)";
pub const ACCEPT_CHALLENGE: &str = "acceptChallenge(uint256,uint8)";
pub const ADD_ADMIN: &str = "addAdmin(address)";
pub const REMOVE_ADMIN: &str = "removeAdmin(address)";
pub const SET_MOVE_TIMEOUT: &str = "setMoveTimeout(uint256)";
pub const SET_PLATFORM_FEE: &str = "setPlatformFee(uint256)";
pub const SET_PLATFORM_FEE_RECIPIENT: &str = "setPlatformFeeRecipient(address)";
pub const SET_K_FACTOR: &str = "setKFactor(uint256)";
pub const SET_SUPPORTED_TOKEN: &str = "setSupportedToken(address,bool,string)";
pub const PAUSE: &str = "pause()";
pub const UNPAUSE: &str = "unpause()";

pub fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

/// Builds calldata: 4-byte selector followed by the ABI-encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(args));
    data
}

pub fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

fn decode_tokens(label: &str, types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    if data.is_empty() {
        return Err(AppError::Decode(format!("{}: empty return data", label)));
    }
    abi::decode(types, data).map_err(|e| AppError::Decode(format!("{}: {}", label, e)))
}

// Walks decoded tokens in declaration order, failing on the first type mismatch.
struct Fields {
    label: &'static str,
    tokens: std::vec::IntoIter<Token>,
}

impl Fields {
    fn new(label: &'static str, tokens: Vec<Token>) -> Self {
        Self {
            label,
            tokens: tokens.into_iter(),
        }
    }

    fn next(&mut self, field: &str) -> Result<Token> {
        self.tokens
            .next()
            .ok_or_else(|| AppError::Decode(format!("{}: missing field {}", self.label, field)))
    }

    fn mismatch(&self, field: &str, expected: &str) -> AppError {
        AppError::Decode(format!("{}: {} is not {}", self.label, field, expected))
    }

    fn address(&mut self, field: &str) -> Result<Address> {
        self.next(field)?
            .into_address()
            .ok_or_else(|| self.mismatch(field, "an address"))
    }

    fn uint(&mut self, field: &str) -> Result<U256> {
        self.next(field)?
            .into_uint()
            .ok_or_else(|| self.mismatch(field, "a uint"))
    }

    fn small_uint(&mut self, field: &str) -> Result<u8> {
        let value = self.uint(field)?;
        if value > U256::from(u8::MAX) {
            return Err(self.mismatch(field, "a uint8"));
        }
        Ok(value.as_u32() as u8)
    }

    fn boolean(&mut self, field: &str) -> Result<bool> {
        self.next(field)?
            .into_bool()
            .ok_or_else(|| self.mismatch(field, "a bool"))
    }

    fn string(&mut self, field: &str) -> Result<String> {
        self.next(field)?
            .into_string()
            .ok_or_else(|| self.mismatch(field, "a string"))
    }
}

// A zero board size comes from records written before sizes existed.
fn board_size_or_default(label: &str, raw: u8) -> Result<u8> {
    let size = if raw == 0 { DEFAULT_BOARD_SIZE } else { raw };
    validate_board_size(size).map_err(|_| AppError::Decode(format!("{}: invalid board size {}", label, raw)))?;
    Ok(size)
}

fn game_params() -> Vec<ParamType> {
    vec![
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Bool,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Uint(8),
        ParamType::Uint(8),
    ]
}

/// Decodes the `getGame` struct.
pub fn decode_game(data: &[u8]) -> Result<RawGame> {
    let tokens = decode_tokens("getGame", &[ParamType::Tuple(game_params())], data)?;
    let inner = tokens
        .into_iter()
        .next()
        .and_then(Token::into_tuple)
        .ok_or_else(|| AppError::Decode("getGame: expected a tuple".to_string()))?;
    let mut fields = Fields::new("getGame", inner);

    let player_one = fields.address("playerOne")?;
    let player_two = fields.address("playerTwo")?;
    let bet_amount = fields.uint("betAmount")?;
    let token_address = fields.address("tokenAddress")?;
    let is_player_one_turn = fields.boolean("isPlayerOneTurn")?;
    let winner = fields.address("winner")?;
    let last_move_timestamp = fields.uint("lastMoveTimestamp")?;
    let status = ContractGameStatus::try_from(fields.small_uint("status")?)?;
    let board_size = board_size_or_default("getGame", fields.small_uint("boardSize")?)?;

    Ok(RawGame {
        player_one,
        player_two,
        bet_amount,
        token_address,
        is_player_one_turn,
        winner,
        last_move_timestamp,
        status,
        board_size,
    })
}

/// Decodes the ten positional outputs of `getChallenge`.
pub fn decode_challenge(data: &[u8]) -> Result<RawChallenge> {
    let types = [
        ParamType::Address,
        ParamType::String,
        ParamType::Address,
        ParamType::String,
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Uint(8),
        ParamType::Uint(256),
        ParamType::Bool,
        ParamType::Uint(256),
    ];
    let mut fields = Fields::new("getChallenge", decode_tokens("getChallenge", &types, data)?);

    Ok(RawChallenge {
        challenger: fields.address("challenger")?,
        challenger_username: fields.string("challengerUsername")?,
        challenged: fields.address("challenged")?,
        challenged_username: fields.string("challengedUsername")?,
        bet_amount: fields.uint("betAmount")?,
        token_address: fields.address("tokenAddress")?,
        board_size: board_size_or_default("getChallenge", fields.small_uint("boardSize")?)?,
        timestamp: fields.uint("timestamp")?,
        accepted: fields.boolean("accepted")?,
        game_id: fields.uint("gameId")?,
    })
}

/// Decodes the `getPlayer` struct.
pub fn decode_player(data: &[u8]) -> Result<RawPlayer> {
    let player = ParamType::Tuple(vec![
        ParamType::String,
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Bool,
    ]);
    let inner = decode_tokens("getPlayer", &[player], data)?
        .into_iter()
        .next()
        .and_then(Token::into_tuple)
        .ok_or_else(|| AppError::Decode("getPlayer: expected a tuple".to_string()))?;
    let mut fields = Fields::new("getPlayer", inner);

    Ok(RawPlayer {
        username: fields.string("username")?,
        wins: fields.uint("wins")?,
        losses: fields.uint("losses")?,
        draws: fields.uint("draws")?,
        total_games: fields.uint("totalGames")?,
        rating: fields.uint("rating")?,
        registered: fields.boolean("registered")?,
    })
}

pub fn decode_uint(label: &'static str, data: &[u8]) -> Result<U256> {
    Fields::new(label, decode_tokens(label, &[ParamType::Uint(256)], data)?).uint("value")
}

pub fn decode_u8(label: &'static str, data: &[u8]) -> Result<u8> {
    Fields::new(label, decode_tokens(label, &[ParamType::Uint(8)], data)?).small_uint("value")
}

pub fn decode_bool(label: &'static str, data: &[u8]) -> Result<bool> {
    Fields::new(label, decode_tokens(label, &[ParamType::Bool], data)?).boolean("value")
}

pub fn decode_address(label: &'static str, data: &[u8]) -> Result<Address> {
    Fields::new(label, decode_tokens(label, &[ParamType::Address], data)?).address("value")
}

pub fn decode_string(label: &'static str, data: &[u8]) -> Result<String> {
    Fields::new(label, decode_tokens(label, &[ParamType::String], data)?).string("value")
}

pub fn decode_uint_array(label: &'static str, data: &[u8]) -> Result<Vec<U256>> {
    let types = [ParamType::Array(Box::new(ParamType::Uint(256)))];
    let items = decode_tokens(label, &types, data)?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| AppError::Decode(format!("{}: expected uint256[]", label)))?;
    items
        .into_iter()
        .map(|item| {
            item.into_uint()
                .ok_or_else(|| AppError::Decode(format!("{}: non-uint array item", label)))
        })
        .collect()
}

pub fn decode_address_array(label: &'static str, data: &[u8]) -> Result<Vec<Address>> {
    let types = [ParamType::Array(Box::new(ParamType::Address))];
    let items = decode_tokens(label, &types, data)?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| AppError::Decode(format!("{}: expected address[]", label)))?;
    items
        .into_iter()
        .map(|item| {
            item.into_address()
                .ok_or_else(|| AppError::Decode(format!("{}: non-address array item", label)))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn game_tokens(raw: &RawGame, status: u8, board_size: u8) -> Vec<u8> {
        abi::encode(&[Token::Tuple(vec![
            Token::Address(raw.player_one),
            Token::Address(raw.player_two),
            Token::Uint(raw.bet_amount),
            Token::Address(raw.token_address),
            Token::Bool(raw.is_player_one_turn),
            Token::Address(raw.winner),
            Token::Uint(raw.last_move_timestamp),
            Token::Uint(U256::from(status)),
            Token::Uint(U256::from(board_size)),
        ])])
    }
}
