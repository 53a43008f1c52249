use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256},
    providers::{DynProvider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use tracing::info;

use crate::ports::{
    TxReceipt,
    mint_gate::{MintGate, MintGateError},
};

sol! {
    #[sol(rpc)]
    interface IProofOfParticipation {
        function merkleRoot() external view returns (bytes32);
        function setMerkleRoot(bytes32 root) external;

        function isEligible(bytes32 leaf, bytes32[] calldata proof) external view returns (bool);
        function hasMinted(bytes32 leaf) external view returns (bool);
        function totalSupply() external view returns (uint256);

        function mint(bytes32 leaf, bytes32[] calldata proof) external;

        event MerkleRootUpdated(bytes32 indexed previousRoot, bytes32 indexed newRoot);
        event ParticipationMinted(bytes32 indexed leaf, address indexed to, uint256 tokenId);
    }
}

/// Mint gate adapter for a deployed proof-of-participation contract.
#[derive(Clone)]
pub struct EthereumMintGate {
    provider: DynProvider,
    contract: Address,
    can_sign: bool,
}

impl EthereumMintGate {
    /// Connect to `contract` over HTTP. Without `private_key` the adapter is
    /// read-only and state-changing calls fail with `TransactionFailed`.
    pub fn new(
        rpc_url: &str,
        private_key: Option<&str>,
        contract: Address,
    ) -> Result<Self, MintGateError> {
        let url = rpc_url
            .parse()
            .map_err(|e| MintGateError::Rpc(format!("Invalid RPC URL: {}", e)))?;

        let provider = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|e| MintGateError::Rpc(format!("Invalid private key: {}", e)))?;
                let wallet = EthereumWallet::from(signer);
                DynProvider::new(ProviderBuilder::new().wallet(wallet).connect_http(url))
            }
            None => DynProvider::new(ProviderBuilder::new().connect_http(url)),
        };

        Ok(Self {
            provider,
            contract,
            can_sign: private_key.is_some(),
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    fn require_signer(&self, call: &str) -> Result<(), MintGateError> {
        if !self.can_sign {
            return Err(MintGateError::TransactionFailed(format!(
                "{call} requires a signing key"
            )));
        }
        Ok(())
    }

    fn convert_receipt(receipt: &alloy::rpc::types::TransactionReceipt) -> TxReceipt {
        TxReceipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
        }
    }
}

impl MintGate for EthereumMintGate {
    async fn merkle_root(&self) -> Result<B256, MintGateError> {
        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        gate.merkleRoot()
            .call()
            .await
            .map_err(|e| MintGateError::Rpc(e.to_string()))
    }

    async fn set_merkle_root(&self, root: B256) -> Result<TxReceipt, MintGateError> {
        self.require_signer("setMerkleRoot")?;
        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        let receipt = gate
            .setMerkleRoot(root)
            .send()
            .await
            .map_err(|e| MintGateError::TransactionFailed(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| MintGateError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(MintGateError::TransactionFailed(
                "setMerkleRoot reverted".into(),
            ));
        }

        info!(contract = %self.contract, %root, tx = %receipt.transaction_hash, "merkle root updated on chain");
        Ok(Self::convert_receipt(&receipt))
    }

    async fn is_eligible(&self, leaf: B256, proof: &[B256]) -> Result<bool, MintGateError> {
        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        gate.isEligible(leaf, proof.to_vec())
            .call()
            .await
            .map_err(|e| MintGateError::Rpc(e.to_string()))
    }

    async fn has_consumed(&self, leaf: B256) -> Result<bool, MintGateError> {
        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        gate.hasMinted(leaf)
            .call()
            .await
            .map_err(|e| MintGateError::Rpc(e.to_string()))
    }

    async fn mint(&self, leaf: B256, proof: &[B256]) -> Result<TxReceipt, MintGateError> {
        self.require_signer("mint")?;

        // Both conditions revert on chain; report them as typed errors.
        if self.has_consumed(leaf).await? {
            return Err(MintGateError::AlreadyConsumed(leaf));
        }
        if !self.is_eligible(leaf, proof).await? {
            return Err(MintGateError::NotEligible(leaf));
        }

        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        let receipt = gate
            .mint(leaf, proof.to_vec())
            .send()
            .await
            .map_err(|e| MintGateError::TransactionFailed(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| MintGateError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(MintGateError::TransactionFailed("mint reverted".into()));
        }

        Ok(Self::convert_receipt(&receipt))
    }

    async fn total_minted(&self) -> Result<u64, MintGateError> {
        let gate = IProofOfParticipation::new(self.contract, &self.provider);
        let supply = gate
            .totalSupply()
            .call()
            .await
            .map_err(|e| MintGateError::Rpc(e.to_string()))?;
        Ok(supply.saturating_to::<u64>())
    }
}
