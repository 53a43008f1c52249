use std::collections::HashSet;

use alloy_primitives::{B256, keccak256};
use tokio::sync::Mutex;

use crate::domain::merkle::verify_proof;
use crate::ports::TxReceipt;
use crate::ports::mint_gate::{MintGate, MintGateError};

#[derive(Default)]
struct GateState {
    root: B256,
    consumed: HashSet<B256>,
    minted: u64,
    /// Every root ever set, oldest first.
    root_history: Vec<B256>,
    nonce: u64,
    offline: bool,
}

/// In-process mint gate with the contract's rules: `mint` reverts unless the
/// proof verifies against the active root and the leaf has not minted yet.
pub struct MockMintGate {
    state: Mutex<GateState>,
}

impl MockMintGate {
    /// A gate with a zero root: nothing is eligible until a root is pushed.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
        }
    }

    /// Simulate an unreachable RPC endpoint.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn root_history(&self) -> Vec<B256> {
        self.state.lock().await.root_history.clone()
    }

    fn receipt(state: &mut GateState) -> TxReceipt {
        state.nonce += 1;
        TxReceipt {
            tx_hash: keccak256(state.nonce.to_be_bytes()),
            success: true,
        }
    }

    fn check_online(state: &GateState) -> Result<(), MintGateError> {
        if state.offline {
            return Err(MintGateError::Rpc("mock gate offline".into()));
        }
        Ok(())
    }
}

impl Default for MockMintGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MintGate for MockMintGate {
    async fn merkle_root(&self) -> Result<B256, MintGateError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(state.root)
    }

    async fn set_merkle_root(&self, root: B256) -> Result<TxReceipt, MintGateError> {
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        state.root = root;
        state.root_history.push(root);
        Ok(Self::receipt(&mut state))
    }

    async fn is_eligible(&self, leaf: B256, proof: &[B256]) -> Result<bool, MintGateError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(!state.root.is_zero() && verify_proof(leaf, proof, state.root))
    }

    async fn has_consumed(&self, leaf: B256) -> Result<bool, MintGateError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(state.consumed.contains(&leaf))
    }

    async fn mint(&self, leaf: B256, proof: &[B256]) -> Result<TxReceipt, MintGateError> {
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        if state.root.is_zero() || !verify_proof(leaf, proof, state.root) {
            return Err(MintGateError::NotEligible(leaf));
        }
        if !state.consumed.insert(leaf) {
            return Err(MintGateError::AlreadyConsumed(leaf));
        }
        state.minted += 1;
        Ok(Self::receipt(&mut state))
    }

    async fn total_minted(&self) -> Result<u64, MintGateError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(state.minted)
    }
}
