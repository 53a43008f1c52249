use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diagnostics::{ChainView, Diagnosis, diagnose_record};
use crate::domain::campaign::EligibilitySnapshot;
use crate::domain::identity::Identity;
use crate::error::EligibilityError;
use crate::ports::mint_gate::{MintGate, MintGateError};
use crate::ports::store::CampaignStore;
use crate::ports::{MintRequest, TxReceipt};
use crate::registry::{EligibilityRegistry, check_root};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Stored root next to the mint gate's active root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub campaign: String,
    pub stored_root: Option<B256>,
    pub chain_root: B256,
    /// Root this system last pushed, as recorded in the store.
    pub synced_root: Option<B256>,
    pub in_sync: bool,
}

/// Outcome of a root push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PushOutcome {
    /// The gate already had the stored root; no transaction was sent.
    AlreadySynced { root: B256 },
    Pushed { root: B256, receipt: TxReceipt },
}

/// The only path between the store's root and the mint gate's root.
///
/// Generic over `CampaignStore` and `MintGate`. Each campaign maps to the
/// gate of its deployed contract; campaigns without a gate can still be
/// edited and diagnosed offline through the registry.
pub struct RootSync<S: CampaignStore, G: MintGate> {
    registry: Arc<EligibilityRegistry<S>>,
    /// campaign id → mint gate
    gates: HashMap<String, G>,
    call_timeout: Duration,
}

impl<S: CampaignStore, G: MintGate> RootSync<S, G> {
    pub fn new(registry: Arc<EligibilityRegistry<S>>, gates: HashMap<String, G>) -> Self {
        Self {
            registry,
            gates,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bound every chain call (receipts included) by `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<EligibilityRegistry<S>> {
        &self.registry
    }

    pub fn has_gate(&self, id: &str) -> bool {
        self.gates.contains_key(id)
    }

    fn gate(&self, id: &str) -> Result<&G, EligibilityError> {
        self.gates
            .get(id)
            .ok_or_else(|| EligibilityError::NoMintGate(id.to_string()))
    }

    async fn chain_call<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, MintGateError>>,
    ) -> Result<T, EligibilityError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(call = what, timeout = ?self.call_timeout, "chain call timed out");
                Err(EligibilityError::ChainTimeout(what))
            }
        }
    }

    /// Compare the stored root with the gate's active root.
    pub async fn chain_status(&self, id: &str) -> Result<ChainStatus, EligibilityError> {
        let gate = self.gate(id)?;
        let campaign = self.registry.campaign(id).await?;
        let chain_root = self.chain_call("merkleRoot", gate.merkle_root()).await?;
        Ok(ChainStatus {
            campaign: campaign.id,
            stored_root: campaign.merkle_root,
            chain_root,
            synced_root: campaign.synced_root,
            in_sync: campaign.merkle_root == Some(chain_root),
        })
    }

    /// Fail with `ChainDrift` unless the gate holds the stored root.
    pub async fn ensure_in_sync(&self, id: &str) -> Result<B256, EligibilityError> {
        let status = self.chain_status(id).await?;
        match status.stored_root {
            Some(stored) if status.in_sync => Ok(stored),
            Some(stored) => Err(EligibilityError::ChainDrift {
                campaign: status.campaign,
                stored,
                chain: status.chain_root,
            }),
            None => Err(EligibilityError::EmptyEligibilitySet(status.campaign)),
        }
    }

    /// Push the stored root to the mint gate.
    ///
    /// Refuses with `RootDrift` when the stored root does not match a rebuild
    /// of the stored list, and with `CampaignLocked` when the gate has already
    /// minted against the root it holds. Never retried automatically: if the list changes
    /// between attempts a retry would publish a different root.
    pub async fn push_root(&self, id: &str) -> Result<PushOutcome, EligibilityError> {
        let gate = self.gate(id)?;
        let campaign = self.registry.campaign(id).await?;

        let root = check_root(&campaign)?
            .ok_or_else(|| EligibilityError::EmptyEligibilitySet(id.to_string()))?;

        let chain_root = self.chain_call("merkleRoot", gate.merkle_root()).await?;
        if chain_root == root {
            info!(campaign = id, %root, "mint gate already holds the stored root");
            self.registry.mark_synced(id, root).await?;
            return Ok(PushOutcome::AlreadySynced { root });
        }

        self.refuse_after_mint(id, gate).await?;

        info!(campaign = id, previous = %chain_root, %root, "pushing merkle root to mint gate");
        let receipt = self
            .chain_call("setMerkleRoot", gate.set_merkle_root(root))
            .await?;
        self.registry.mark_synced(id, root).await?;
        info!(campaign = id, %root, tx = %receipt.tx_hash, "merkle root synced");

        Ok(PushOutcome::Pushed { root, receipt })
    }

    /// Refuse identity edits once the campaign is closed or the gate has
    /// minted against its committed root, whatever the store holds now.
    ///
    /// A campaign whose root was pushed cannot be edited without its gate:
    /// there is no way to tell whether minting has started.
    pub async fn guard_edits(&self, id: &str) -> Result<(), EligibilityError> {
        let campaign = self.registry.campaign(id).await?;
        if campaign.closed {
            return Err(EligibilityError::CampaignLocked {
                campaign: campaign.id,
                reason: "campaign is closed",
            });
        }
        match self.gates.get(id) {
            Some(gate) => self.refuse_after_mint(id, gate).await,
            None if campaign.synced_root.is_some() => Err(EligibilityError::CampaignLocked {
                campaign: campaign.id,
                reason: "a root is committed on chain and no mint gate is connected",
            }),
            None => Ok(()),
        }
    }

    /// Close the campaign and fail with `CampaignLocked` if the gate reports
    /// any minted token.
    async fn refuse_after_mint(&self, id: &str, gate: &G) -> Result<(), EligibilityError> {
        let minted = self.chain_call("totalSupply", gate.total_minted()).await?;
        if minted > 0 {
            warn!(campaign = id, minted, "minting has started against the committed root; closing");
            self.registry.close_campaign(id).await?;
            return Err(EligibilityError::CampaignLocked {
                campaign: id.to_string(),
                reason: "tokens have been minted against the committed root",
            });
        }
        Ok(())
    }

    pub async fn set_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.guard_edits(id).await?;
        self.registry.set_identities(id, identities).await
    }

    pub async fn add_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.guard_edits(id).await?;
        self.registry.add_identities(id, identities).await
    }

    pub async fn remove_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.guard_edits(id).await?;
        self.registry.remove_identities(id, identities).await
    }

    /// Build the mint request for `identity`, failing early on anything the
    /// gate would revert on.
    pub async fn prepare_mint(
        &self,
        id: &str,
        identity: &str,
    ) -> Result<MintRequest, EligibilityError> {
        let gate = self.gate(id)?;
        let proof = self.registry.proof_for(id, identity).await?;

        self.ensure_in_sync(id).await?;

        if self
            .chain_call("hasMinted", gate.has_consumed(proof.leaf))
            .await?
        {
            return Err(EligibilityError::AlreadyConsumed(proof.leaf));
        }

        Ok(MintRequest {
            leaf_hash: proof.leaf,
            proof: proof.path,
        })
    }

    /// The payload a client submits to the gate. With a gate connected the
    /// chain checks of [`prepare_mint`](Self::prepare_mint) run first.
    /// Without one, proofs are served from the store only while no root has
    /// been committed on chain.
    pub async fn mint_request(
        &self,
        id: &str,
        identity: &str,
    ) -> Result<MintRequest, EligibilityError> {
        if self.has_gate(id) {
            return self.prepare_mint(id, identity).await;
        }
        let campaign = self.registry.campaign(id).await?;
        if campaign.synced_root.is_some() {
            return Err(EligibilityError::NoMintGate(campaign.id));
        }
        let proof = self.registry.proof_for(id, identity).await?;
        Ok(MintRequest {
            leaf_hash: proof.leaf,
            proof: proof.path,
        })
    }

    /// Prepare and submit a mint. The first successful mint closes the
    /// campaign for identity edits.
    pub async fn mint(&self, id: &str, identity: &str) -> Result<TxReceipt, EligibilityError> {
        let request = self.prepare_mint(id, identity).await?;
        let gate = self.gate(id)?;
        let receipt = self
            .chain_call("mint", gate.mint(request.leaf_hash, &request.proof))
            .await?;
        info!(campaign = id, leaf = %request.leaf_hash, tx = %receipt.tx_hash, "minted");

        self.registry.close_campaign(id).await?;
        Ok(receipt)
    }

    /// Five-way diagnostic. Chain failures degrade to an offline diagnosis.
    pub async fn diagnose(&self, id: &str, identity: &str) -> Result<Diagnosis, EligibilityError> {
        let identity = Identity::parse(identity)?;
        let campaign = self.registry.campaign(id).await?;

        let view = match self.gates.get(id) {
            Some(gate) => match self.chain_view(gate, identity.leaf()).await {
                Ok(view) => Some(view),
                Err(e) => {
                    warn!(campaign = id, error = %e, "mint gate unreachable; diagnosing offline");
                    None
                }
            },
            None => None,
        };

        diagnose_record(&campaign, &identity, view)
    }

    async fn chain_view(&self, gate: &G, leaf: B256) -> Result<ChainView, EligibilityError> {
        let root = self.chain_call("merkleRoot", gate.merkle_root()).await?;
        let consumed = self.chain_call("hasMinted", gate.has_consumed(leaf)).await?;
        Ok(ChainView { root, consumed })
    }
}

/// Diagnose without a mint gate.
pub async fn diagnose_offline<S: CampaignStore>(
    registry: &EligibilityRegistry<S>,
    id: &str,
    identity: &str,
) -> Result<Diagnosis, EligibilityError> {
    let identity = Identity::parse(identity)?;
    let campaign = registry.campaign(id).await?;
    diagnose_record(&campaign, &identity, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryCampaignStore;
    use crate::adapters::mock_mint_gate::MockMintGate;
    use crate::domain::campaign::NewCampaign;

    type TestSync = RootSync<InMemoryCampaignStore, MockMintGate>;

    async fn setup(ids: &[&str]) -> TestSync {
        let registry = Arc::new(EligibilityRegistry::new(InMemoryCampaignStore::new()));
        registry
            .create_campaign(
                NewCampaign {
                    id: "pop".into(),
                    name: "POP".into(),
                    network: "sepolia".into(),
                    ..Default::default()
                },
                ids,
            )
            .await
            .unwrap();
        let mut gates = HashMap::new();
        gates.insert("pop".to_string(), MockMintGate::new());
        RootSync::new(registry, gates)
    }

    #[tokio::test]
    async fn fresh_campaign_is_out_of_sync() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        let status = sync.chain_status("pop").await.unwrap();
        assert!(!status.in_sync);
        assert!(status.synced_root.is_none());
        assert!(matches!(
            sync.ensure_in_sync("pop").await.unwrap_err(),
            EligibilityError::ChainDrift { .. }
        ));
    }

    #[tokio::test]
    async fn push_then_in_sync_and_idempotent() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        let outcome = sync.push_root("pop").await.unwrap();
        let root = match outcome {
            PushOutcome::Pushed { root, .. } => root,
            other => panic!("expected a push, got {other:?}"),
        };
        assert_eq!(sync.ensure_in_sync("pop").await.unwrap(), root);

        let again = sync.push_root("pop").await.unwrap();
        assert_eq!(again, PushOutcome::AlreadySynced { root });
        assert_eq!(sync.gates["pop"].root_history().await, vec![root]);

        let campaign = sync.registry().campaign("pop").await.unwrap();
        assert_eq!(campaign.synced_root, Some(root));
    }

    #[tokio::test]
    async fn push_refused_on_root_drift() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        let mut tampered = sync.registry().campaign("pop").await.unwrap();
        tampered.eligible_identities.push("c@x.com".into());
        sync.registry().store().force_put(tampered).await;

        assert!(matches!(
            sync.push_root("pop").await.unwrap_err(),
            EligibilityError::RootDrift { .. }
        ));
    }

    #[tokio::test]
    async fn prepare_mint_requires_sync() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        assert!(matches!(
            sync.prepare_mint("pop", "a@x.com").await.unwrap_err(),
            EligibilityError::ChainDrift { .. }
        ));

        sync.push_root("pop").await.unwrap();
        let request = sync.prepare_mint("pop", " A@x.com ").await.unwrap();
        assert_eq!(request.leaf_hash, Identity::parse("a@x.com").unwrap().leaf());
    }

    #[tokio::test]
    async fn mint_once_then_already_consumed_and_locked() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        sync.push_root("pop").await.unwrap();

        sync.mint("pop", "a@x.com").await.unwrap();
        assert!(matches!(
            sync.mint("pop", "a@x.com").await.unwrap_err(),
            EligibilityError::AlreadyConsumed(_)
        ));
        assert!(matches!(
            sync.add_identities("pop", ["c@x.com"]).await.unwrap_err(),
            EligibilityError::CampaignLocked { .. }
        ));
        // Other eligible identities can still mint.
        sync.mint("pop", "b@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn edit_after_push_requires_new_push() {
        let sync = setup(&["a@x.com", "b@x.com", "c@x.com"]).await;
        sync.push_root("pop").await.unwrap();
        sync.remove_identities("pop", ["c@x.com"]).await.unwrap();

        assert!(matches!(
            sync.prepare_mint("pop", "b@x.com").await.unwrap_err(),
            EligibilityError::ChainDrift { .. }
        ));
        sync.push_root("pop").await.unwrap();
        sync.prepare_mint("pop", "b@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn direct_mint_on_committed_root_locks_edits_and_push() {
        let sync = setup(&["a@x.com", "b@x.com", "c@x.com"]).await;
        sync.push_root("pop").await.unwrap();
        let committed = sync.registry().proof_for("pop", "a@x.com").await.unwrap();

        // Store moves on while nothing has minted yet.
        sync.add_identities("pop", ["d@x.com"]).await.unwrap();

        // A client mints on the gate with a proof for the committed root.
        sync.gates["pop"]
            .mint(committed.leaf, &committed.path)
            .await
            .unwrap();

        assert!(matches!(
            sync.add_identities("pop", ["e@x.com"]).await.unwrap_err(),
            EligibilityError::CampaignLocked { .. }
        ));
        assert!(sync.registry().campaign("pop").await.unwrap().closed);
        assert!(matches!(
            sync.push_root("pop").await.unwrap_err(),
            EligibilityError::CampaignLocked { .. }
        ));
        assert_eq!(sync.gates["pop"].root_history().await.len(), 1);
    }

    #[tokio::test]
    async fn pushed_campaign_without_gate_is_locked() {
        let registry = Arc::new(EligibilityRegistry::new(InMemoryCampaignStore::new()));
        let created = registry
            .create_campaign(
                NewCampaign {
                    id: "pop".into(),
                    name: "POP".into(),
                    network: "sepolia".into(),
                    contract_address: Some(alloy_primitives::Address::repeat_byte(0x11)),
                    ..Default::default()
                },
                ["a@x.com", "b@x.com"],
            )
            .await
            .unwrap();
        let sync: TestSync = RootSync::new(registry.clone(), HashMap::new());

        // Never pushed: offline edits and store proofs are fine.
        sync.add_identities("pop", ["c@x.com"]).await.unwrap();
        sync.mint_request("pop", "a@x.com").await.unwrap();

        let root = registry.campaign("pop").await.unwrap().merkle_root.unwrap();
        assert_ne!(created.merkle_root, Some(root));
        registry.mark_synced("pop", root).await.unwrap();

        assert!(matches!(
            sync.add_identities("pop", ["d@x.com"]).await.unwrap_err(),
            EligibilityError::CampaignLocked { .. }
        ));
        assert!(matches!(
            sync.mint_request("pop", "a@x.com").await.unwrap_err(),
            EligibilityError::NoMintGate(_)
        ));
    }

    #[tokio::test]
    async fn unknown_campaign_has_no_gate() {
        let sync = setup(&["a@x.com"]).await;
        assert!(matches!(
            sync.push_root("other").await.unwrap_err(),
            EligibilityError::NoMintGate(_)
        ));
    }

    #[tokio::test]
    async fn diagnose_falls_back_offline() {
        let sync = setup(&["a@x.com"]).await;
        sync.push_root("pop").await.unwrap();
        sync.gates["pop"].set_offline(true).await;

        let d = sync.diagnose("pop", "a@x.com").await.unwrap();
        assert_eq!(d.chain_root_matches, None);
        assert!(d.is_mintable());
    }

    #[tokio::test]
    async fn diagnose_reports_chain_drift() {
        let sync = setup(&["a@x.com", "b@x.com"]).await;
        let d = sync.diagnose("pop", "a@x.com").await.unwrap();
        assert_eq!(d.chain_root_matches, Some(false));
        assert!(matches!(
            d.verdict().unwrap_err(),
            EligibilityError::ChainDrift { .. }
        ));
    }

    #[tokio::test]
    async fn offline_diagnosis_without_gate() {
        let sync = setup(&["a@x.com"]).await;
        let d = diagnose_offline(sync.registry(), "pop", "a@x.com").await.unwrap();
        assert!(d.is_mintable());
    }
}
