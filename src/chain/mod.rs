pub mod abi;
pub mod client;
pub mod erc20;
pub mod events;
pub mod multicall;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{EvmContractClient, GameContract};
