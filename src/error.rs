use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Rate limited by RPC: {0}")]
    RateLimited(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps an RPC error text onto `RateLimited` or `BlockchainRPC`.
    pub fn from_rpc(message: impl Into<String>) -> Self {
        let message = message.into();
        if looks_like_rate_limit(&message) {
            AppError::RateLimited(message)
        } else {
            AppError::BlockchainRPC(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }

    /// RPC and throttling failures may clear on retry; decode and lookup failures will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::BlockchainRPC(_) | AppError::RateLimited(_))
    }
}

/// HTTP 429 and JSON-RPC -32016 both count as rate limiting.
pub fn looks_like_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("-32016")
}

// Pulls the revert reason out of a node error such as
// `(code: 3, message: execution reverted: Not your turn, data: ...)`.
pub fn revert_reason(message: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    let start = lower.find("execution reverted")?;
    let tail = &message[start + "execution reverted".len()..];
    let tail = tail.trim_start_matches(':').trim_start();
    let reason = tail
        .split(|c| c == ',' || c == ')' || c == '"')
        .next()
        .unwrap_or("")
        .trim();
    if reason.is_empty() {
        Some("execution reverted".to_string())
    } else {
        Some(reason.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::WalletNotConnected => (
                StatusCode::UNAUTHORIZED,
                "WALLET_NOT_CONNECTED",
                "Please connect your wallet".to_string(),
            ),
            AppError::BlockchainRPC(ref msg) => (
                StatusCode::BAD_GATEWAY,
                "BLOCKCHAIN_RPC_ERROR",
                msg.clone(),
            ),
            AppError::RateLimited(_) => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "RPC rate limit reached. Please try again later.".to_string(),
            ),
            AppError::TransactionFailed(ref msg) => (
                StatusCode::BAD_REQUEST,
                "TRANSACTION_FAILED",
                msg.clone(),
            ),
            AppError::NotFound(ref msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::BadRequest(ref msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
            ),
            AppError::Decode(ref msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DECODE_ERROR",
                msg.clone(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
