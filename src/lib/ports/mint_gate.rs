use alloy_primitives::B256;
use std::future::Future;

use super::TxReceipt;

/// Port for the on-chain ERC-721 mint gate (one instance per deployed contract).
///
/// The contract holds the single active root and a consumed flag per leaf.
/// It re-verifies every proof itself; nothing off-chain is authoritative
/// for whether a leaf has been minted.
///
/// Implementations:
/// - `EthereumMintGate` (alloy)
/// - `MockMintGate` (same business rules, in process)
pub trait MintGate: Send + Sync {
    /// Currently active root.
    fn merkle_root(&self) -> impl Future<Output = Result<B256, MintGateError>> + Send;

    /// Replace the active root (owner only). Proofs built against the old
    /// root stop verifying once this lands.
    fn set_merkle_root(
        &self,
        root: B256,
    ) -> impl Future<Output = Result<TxReceipt, MintGateError>> + Send;

    /// Pure membership check against the active root.
    fn is_eligible(
        &self,
        leaf: B256,
        proof: &[B256],
    ) -> impl Future<Output = Result<bool, MintGateError>> + Send;

    /// Whether `leaf` has already minted.
    fn has_consumed(
        &self,
        leaf: B256,
    ) -> impl Future<Output = Result<bool, MintGateError>> + Send;

    /// Mint for `leaf`. Reverts unless eligible and not yet consumed.
    fn mint(
        &self,
        leaf: B256,
        proof: &[B256],
    ) -> impl Future<Output = Result<TxReceipt, MintGateError>> + Send;

    /// Number of tokens minted so far.
    fn total_minted(&self) -> impl Future<Output = Result<u64, MintGateError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum MintGateError {
    #[error("leaf is not eligible under the active root: {0}")]
    NotEligible(B256),

    #[error("leaf already minted: {0}")]
    AlreadyConsumed(B256),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}
