use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::chain::GameContract;

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub expected_chain_id: u64,
    pub connected_chain_id: Option<u64>,
    pub chain_mismatch: bool,
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl NetworkStatus {
    fn unchecked(expected_chain_id: u64) -> Self {
        Self {
            expected_chain_id,
            connected_chain_id: None,
            chain_mismatch: false,
            checked_at: None,
            last_error: None,
        }
    }
}

/// Tracks whether the RPC endpoint serves the configured chain.
/// A mismatch is reported, never enforced.
pub struct NetworkGuard {
    contract: Arc<dyn GameContract>,
    status: RwLock<NetworkStatus>,
}

impl NetworkGuard {
    pub fn new(contract: Arc<dyn GameContract>, expected_chain_id: u64) -> Self {
        Self {
            contract,
            status: RwLock::new(NetworkStatus::unchecked(expected_chain_id)),
        }
    }

    pub async fn current(&self) -> NetworkStatus {
        self.status.read().await.clone()
    }

    pub async fn refresh(&self) -> NetworkStatus {
        let expected = self.status.read().await.expected_chain_id;
        let mut next = NetworkStatus::unchecked(expected);
        next.checked_at = Some(Utc::now());

        match self.contract.chain_id().await {
            Ok(chain_id) => {
                next.connected_chain_id = Some(chain_id);
                next.chain_mismatch = chain_id != expected;
                if next.chain_mismatch {
                    tracing::warn!(
                        "RPC reports chain id {}, expected {}; reads and writes may target the wrong network",
                        chain_id,
                        expected
                    );
                }
            }
            Err(err) => {
                tracing::warn!("Chain id check failed: {}", err);
                next.last_error = Some(err.to_string());
            }
        }

        *self.status.write().await = next.clone();
        next
    }
}
