pub mod mint_gate;
pub mod store;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Minimal transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
}

/// Payload a client submits to the mint gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    /// `hash(normalize(identity))`
    pub leaf_hash: B256,
    pub proof: Vec<B256>,
}
