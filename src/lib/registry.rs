use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::domain::campaign::{Campaign, EligibilitySnapshot, NewCampaign};
use crate::domain::identity::{Identity, dedup_identities};
use crate::domain::merkle::{EligibilityProof, EligibilityTree, verify_proof};
use crate::error::EligibilityError;
use crate::ports::store::CampaignStore;

/// Result of checking a stored campaign against its own identity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub campaign: String,
    pub stored_root: Option<B256>,
    /// Root rebuilt from the stored identity list (`None` if the list is empty).
    pub recomputed_root: Option<B256>,
    pub root_consistent: bool,
    /// Listed identities whose stored proof fails against the stored root.
    pub stale_proofs: Vec<String>,
    /// Listed identities with no stored proof at all.
    pub missing_proofs: Vec<String>,
    /// Proof entries for identities that are not in the list.
    pub orphan_proofs: Vec<String>,
    /// List entries that are not valid identities. Any entry here makes the
    /// root inconsistent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_identities: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.root_consistent
            && self.stale_proofs.is_empty()
            && self.missing_proofs.is_empty()
            && self.orphan_proofs.is_empty()
    }

    /// `RootDrift` takes precedence over per-identity `StaleProof`.
    pub fn into_result(self) -> Result<(), EligibilityError> {
        if !self.root_consistent {
            return Err(EligibilityError::RootDrift {
                campaign: self.campaign,
                stored: self.stored_root,
                recomputed: self.recomputed_root,
            });
        }
        if let Some(identity) = self
            .stale_proofs
            .into_iter()
            .chain(self.missing_proofs)
            .chain(self.orphan_proofs)
            .next()
        {
            return Err(EligibilityError::StaleProof {
                campaign: self.campaign,
                identity,
            });
        }
        Ok(())
    }
}

/// Rebuild the root from the campaign's stored list and compare it with the
/// stored root. Returns the recomputed root on success.
pub fn check_root(campaign: &Campaign) -> Result<Option<B256>, EligibilityError> {
    let recomputed = recompute_root(&stored_identities(campaign)?);
    if recomputed != campaign.merkle_root {
        return Err(EligibilityError::RootDrift {
            campaign: campaign.id.clone(),
            stored: campaign.merkle_root,
            recomputed,
        });
    }
    Ok(recomputed)
}

fn recompute_root(identities: &[Identity]) -> Option<B256> {
    EligibilityTree::from_identities(identities)
        .ok()
        .map(|tree| tree.root())
}

/// The stored list as identities. A malformed entry can only come from an
/// out-of-band edit, so it is reported as drift rather than bad input.
fn stored_identities(campaign: &Campaign) -> Result<Vec<Identity>, EligibilityError> {
    campaign.identities().map_err(|e| {
        warn!(campaign = %campaign.id, error = %e, "stored list holds an invalid identity");
        EligibilityError::RootDrift {
            campaign: campaign.id.clone(),
            stored: campaign.merkle_root,
            recomputed: None,
        }
    })
}

/// Campaign eligibility service: every membership edit rebuilds the tree,
/// regenerates all proofs and persists them with the list in one write.
///
/// Writes for one campaign are serialized by a per-campaign lock, so two
/// concurrent edits can never persist a root from one and proofs from the
/// other. Different campaigns never contend.
pub struct EligibilityRegistry<S: CampaignStore> {
    store: S,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: CampaignStore> EligibilityRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn lock_campaign(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            locks.entry(id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Fetch a campaign or fail with `CampaignNotFound`.
    pub async fn campaign(&self, id: &str) -> Result<Campaign, EligibilityError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EligibilityError::CampaignNotFound(id.to_string()))
    }

    /// Create a campaign, optionally seeded with identities.
    pub async fn create_campaign<I, T>(
        &self,
        new: NewCampaign,
        seed: I,
    ) -> Result<Campaign, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let identities = dedup_identities(seed)?;
        let _guard = self.lock_campaign(&new.id).await;

        let mut campaign = Campaign::new(new);
        if !identities.is_empty() {
            let tree = EligibilityTree::from_identities(&identities)
                .map_err(|e| EligibilityError::from_tree(&campaign.id, e))?;
            campaign.apply(&identities, &tree);
        }
        self.store.insert(campaign.clone()).await?;

        info!(
            campaign = %campaign.id,
            identities = campaign.eligible_identities.len(),
            root = ?campaign.merkle_root,
            "campaign created"
        );
        Ok(campaign)
    }

    /// Replace the eligible set and recompute root and proofs.
    pub async fn set_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let identities = dedup_identities(identities)?;
        self.rewrite(id, |_| identities).await
    }

    /// Union `identities` with the current set, then recompute. Every
    /// existing proof changes; previously issued proofs are stale.
    pub async fn add_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let added = dedup_identities(identities)?;
        self.rewrite(id, move |current| {
            let mut merged = current;
            let known: BTreeSet<Identity> = merged.iter().cloned().collect();
            merged.extend(added.into_iter().filter(|i| !known.contains(i)));
            merged
        })
        .await
    }

    /// Remove `identities` from the current set, then recompute.
    pub async fn remove_identities<I, T>(
        &self,
        id: &str,
        identities: I,
    ) -> Result<EligibilitySnapshot, EligibilityError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let removed: BTreeSet<Identity> = dedup_identities(identities)?.into_iter().collect();
        self.rewrite(id, move |current| {
            current
                .into_iter()
                .filter(|i| !removed.contains(i))
                .collect()
        })
        .await
    }

    async fn rewrite<F>(&self, id: &str, edit: F) -> Result<EligibilitySnapshot, EligibilityError>
    where
        F: FnOnce(Vec<Identity>) -> Vec<Identity>,
    {
        let _guard = self.lock_campaign(id).await;

        let mut campaign = self.campaign(id).await?;
        if campaign.closed {
            return Err(EligibilityError::CampaignLocked {
                campaign: campaign.id,
                reason: "campaign is closed",
            });
        }

        let identities = edit(stored_identities(&campaign)?);
        let tree = EligibilityTree::from_identities(&identities)
            .map_err(|e| EligibilityError::from_tree(id, e))?;

        let previous = campaign.merkle_root;
        let snapshot = campaign.apply(&identities, &tree);
        self.store.put(campaign).await?;

        info!(
            campaign = id,
            identities = identities.len(),
            depth = tree.depth(),
            previous = ?previous,
            root = %snapshot.merkle_root,
            "eligibility tree rebuilt"
        );
        Ok(snapshot)
    }

    /// Proof for `identity`, checked against the stored root before it is
    /// handed out.
    pub async fn proof_for(
        &self,
        id: &str,
        identity: &str,
    ) -> Result<EligibilityProof, EligibilityError> {
        let identity = Identity::parse(identity)?;
        let campaign = self.campaign(id).await?;
        proof_from_record(&campaign, &identity)
    }

    /// Check (a) the stored root against a rebuild of the stored list and
    /// (b) every stored proof against the stored root.
    pub async fn check_consistency(&self, id: &str) -> Result<ConsistencyReport, EligibilityError> {
        let campaign = self.campaign(id).await?;
        let report = consistency_report(&campaign);
        if !report.is_consistent() {
            warn!(
                campaign = id,
                root_consistent = report.root_consistent,
                stale = report.stale_proofs.len(),
                missing = report.missing_proofs.len(),
                orphans = report.orphan_proofs.len(),
                invalid = report.invalid_identities.len(),
                "campaign store is inconsistent"
            );
        }
        Ok(report)
    }

    /// Freeze identity edits.
    pub async fn close_campaign(&self, id: &str) -> Result<Campaign, EligibilityError> {
        let _guard = self.lock_campaign(id).await;
        let mut campaign = self.campaign(id).await?;
        if !campaign.closed {
            campaign.closed = true;
            campaign.touch();
            self.store.put(campaign.clone()).await?;
            info!(campaign = id, "campaign closed");
        }
        Ok(campaign)
    }

    /// Remove a campaign record. Refused once a root has been pushed to a
    /// mint gate, since the chain still references it.
    pub async fn delete_campaign(&self, id: &str) -> Result<(), EligibilityError> {
        let _guard = self.lock_campaign(id).await;
        let campaign = self.campaign(id).await?;
        if campaign.synced_root.is_some() {
            return Err(EligibilityError::CampaignLocked {
                campaign: campaign.id,
                reason: "a root has been pushed to the mint gate",
            });
        }
        self.store.delete(id).await?;
        self.write_locks.lock().await.remove(id);
        info!(campaign = id, "campaign deleted");
        Ok(())
    }

    /// Record that `root` is now active on chain. Refuses if the stored root
    /// moved on since the push was decided.
    pub async fn mark_synced(&self, id: &str, root: B256) -> Result<Campaign, EligibilityError> {
        let _guard = self.lock_campaign(id).await;
        let mut campaign = self.campaign(id).await?;
        if campaign.merkle_root != Some(root) {
            return Err(EligibilityError::RootDrift {
                campaign: campaign.id,
                stored: campaign.merkle_root,
                recomputed: Some(root),
            });
        }
        campaign.synced_root = Some(root);
        campaign.touch();
        self.store.put(campaign.clone()).await?;
        Ok(campaign)
    }
}

/// Per-identity check: listed, has a proof, proof verifies against the
/// stored root.
pub fn proof_from_record(
    campaign: &Campaign,
    identity: &Identity,
) -> Result<EligibilityProof, EligibilityError> {
    let listed = campaign.lists(identity.as_str());
    let stored = campaign.stored_proof(identity);

    let proof = match (listed, stored) {
        (false, _) => {
            return Err(EligibilityError::NotEligible {
                campaign: campaign.id.clone(),
                identity: identity.to_string(),
            });
        }
        (true, None) => None,
        (true, Some(proof)) => Some(proof),
    };

    match (proof, campaign.merkle_root) {
        (Some(proof), Some(root)) if proof.verify(root) => Ok(proof),
        _ => {
            warn!(campaign = %campaign.id, %identity, "stored proof failed verification");
            Err(EligibilityError::StaleProof {
                campaign: campaign.id.clone(),
                identity: identity.to_string(),
            })
        }
    }
}

/// Build a consistency report for a campaign record without touching the store.
pub fn consistency_report(campaign: &Campaign) -> ConsistencyReport {
    let mut seen = BTreeSet::new();
    let mut identities = Vec::new();
    let mut invalid_identities = Vec::new();
    for raw in &campaign.eligible_identities {
        match Identity::parse(raw) {
            Ok(identity) => {
                if seen.insert(identity.clone()) {
                    identities.push(identity);
                }
            }
            Err(_) => invalid_identities.push(raw.clone()),
        }
    }
    let recomputed_root = recompute_root(&identities);

    let mut stale_proofs = Vec::new();
    let mut missing_proofs = Vec::new();
    for identity in &identities {
        match campaign.merkle_proofs.get(identity.as_str()) {
            None => missing_proofs.push(identity.to_string()),
            Some(path) => {
                let verifies = campaign
                    .merkle_root
                    .is_some_and(|root| verify_proof(identity.leaf(), path, root));
                if !verifies {
                    stale_proofs.push(identity.to_string());
                }
            }
        }
    }

    let listed: BTreeSet<&str> = identities.iter().map(Identity::as_str).collect();
    let orphan_proofs = campaign
        .merkle_proofs
        .keys()
        .filter(|key| !listed.contains(key.as_str()))
        .cloned()
        .collect();

    ConsistencyReport {
        campaign: campaign.id.clone(),
        stored_root: campaign.merkle_root,
        recomputed_root,
        root_consistent: invalid_identities.is_empty() && recomputed_root == campaign.merkle_root,
        stale_proofs,
        missing_proofs,
        orphan_proofs,
        invalid_identities,
    }
}
