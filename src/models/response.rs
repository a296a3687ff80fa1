use ethers::types::H256;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Result of a confirmed contract write.
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub action: String,
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    /// Approval sent ahead of the main call, if the allowance was short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<H256>,
    /// Set for createGame and acceptChallenge when the event was found in the receipt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<u64>,
}
