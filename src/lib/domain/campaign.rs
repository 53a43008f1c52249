use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::identity::{Identity, InvalidIdentity, dedup_identities};
use super::merkle::{EligibilityProof, EligibilityTree};
use crate::crypto::leaf::normalize_identity;

/// Persisted campaign record.
///
/// `merkle_root` and `merkle_proofs` are derived from `eligible_identities`
/// and are only ever written together with it. `synced_root` is the root
/// this system last pushed to the mint gate; the gate itself stays the
/// authority on which root is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Chain the mint gate lives on (e.g. "sepolia").
    pub network: String,
    #[serde(default)]
    pub max_supply: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub eligible_identities: Vec<String>,
    #[serde(default)]
    pub merkle_root: Option<B256>,
    #[serde(default)]
    pub merkle_proofs: BTreeMap<String, Vec<B256>>,
    #[serde(default)]
    pub synced_root: Option<B256>,
    #[serde(default)]
    pub closed: bool,
    /// Unix seconds of the last write.
    #[serde(default)]
    pub updated_at: u64,
}

/// Input for creating a campaign.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub id: String,
    pub name: String,
    pub network: String,
    #[serde(default)]
    pub max_supply: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

/// Root and proofs produced by a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilitySnapshot {
    pub merkle_root: B256,
    pub merkle_proofs: BTreeMap<String, Vec<B256>>,
}

impl Campaign {
    pub fn new(new: NewCampaign) -> Self {
        Self {
            id: new.id,
            name: new.name,
            network: new.network,
            max_supply: new.max_supply,
            contract_address: new.contract_address,
            eligible_identities: Vec::new(),
            merkle_root: None,
            merkle_proofs: BTreeMap::new(),
            synced_root: None,
            closed: false,
            updated_at: unix_now(),
        }
    }

    /// Stored identities re-parsed through the canonical normalization.
    pub fn identities(&self) -> Result<Vec<Identity>, InvalidIdentity> {
        dedup_identities(&self.eligible_identities)
    }

    /// Whether `identity` (raw) appears in the stored list after normalization.
    pub fn lists(&self, identity: &str) -> bool {
        let wanted = normalize_identity(identity);
        self.eligible_identities
            .iter()
            .any(|stored| normalize_identity(stored) == wanted)
    }

    /// Stored proof for `identity`, keyed by its normalized form.
    pub fn stored_proof(&self, identity: &Identity) -> Option<EligibilityProof> {
        self.merkle_proofs
            .get(identity.as_str())
            .map(|path| EligibilityProof {
                leaf: identity.leaf(),
                path: path.clone(),
            })
    }

    /// Replace list, root and proofs in one step from a freshly built tree.
    pub fn apply(&mut self, identities: &[Identity], tree: &EligibilityTree) -> EligibilitySnapshot {
        let by_leaf: HashMap<B256, Vec<B256>> = tree
            .proofs()
            .map(|proof| (proof.leaf, proof.path))
            .collect();

        let merkle_proofs: BTreeMap<String, Vec<B256>> = identities
            .iter()
            .filter_map(|identity| {
                by_leaf
                    .get(&identity.leaf())
                    .map(|path| (identity.as_str().to_string(), path.clone()))
            })
            .collect();

        self.eligible_identities = identities.iter().map(|i| i.as_str().to_string()).collect();
        self.merkle_root = Some(tree.root());
        self.merkle_proofs = merkle_proofs.clone();
        self.updated_at = unix_now();

        EligibilitySnapshot {
            merkle_root: tree.root(),
            merkle_proofs,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = unix_now();
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
