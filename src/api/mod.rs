// src/api/mod.rs

pub mod admin;
pub mod challenges;
pub mod games;
pub mod health;
pub mod players;
pub mod tokens;

use std::sync::Arc;

use ethers::providers::{Http, Provider};
use ethers::types::Address;

use crate::chain::GameContract;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::{GameTransactor, NetworkGuard};
use crate::utils::parse_optional_address;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub provider: Arc<Provider<Http>>,
    pub contract: Arc<dyn GameContract>,
    /// `None` when no signing key is configured; write endpoints then refuse.
    pub transactor: Option<Arc<GameTransactor>>,
    pub network: Arc<NetworkGuard>,
}

pub fn require_transactor(state: &AppState) -> Result<Arc<GameTransactor>> {
    state
        .transactor
        .clone()
        .ok_or(AppError::WalletNotConnected)
}

/// Explicit `viewer` query value, else the signer address when one is configured.
pub fn resolve_viewer(state: &AppState, raw: Option<&str>) -> Result<Option<Address>> {
    let explicit = parse_optional_address(raw)?;
    Ok(explicit.or_else(|| {
        state
            .transactor
            .as_ref()
            .map(|transactor| transactor.signer_address())
    }))
}


#[cfg(test)]
mod tests {
    use super::test_support::state_with;
    use super::*;
    use crate::chain::mock::{addr, MockContract};

    #[test]
    fn writes_without_signer_are_refused() {
        let state = state_with(MockContract::new());
        assert!(matches!(
            require_transactor(&state),
            Err(AppError::WalletNotConnected)
        ));
    }

    #[test]
    fn viewer_resolution() {
        let state = state_with(MockContract::new());
        assert_eq!(resolve_viewer(&state, None).unwrap(), None);
        assert_eq!(resolve_viewer(&state, Some("  ")).unwrap(), None);
        let explicit = format!("{:#x}", addr(0x11));
        assert_eq!(
            resolve_viewer(&state, Some(&explicit)).unwrap(),
            Some(addr(0x11))
        );
        assert!(resolve_viewer(&state, Some("0x12")).is_err());
    }
}
