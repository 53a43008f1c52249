//! "Why can't this user mint?"
//!
//! Five independent checks for one `(campaign, identity)` pair: the identity
//! is listed, a proof is stored, the proof verifies against the stored root,
//! the stored root matches a rebuild of the stored list, and the stored root
//! matches the mint gate's active root. The on-chain consumed flag is
//! reported alongside when the gate is reachable.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::domain::campaign::Campaign;
use crate::domain::identity::Identity;
use crate::domain::merkle::verify_proof;
use crate::error::EligibilityError;
use crate::registry::consistency_report;

/// What the mint gate reported, if it was reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainView {
    pub root: B256,
    pub consumed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub campaign: String,
    pub identity: String,
    pub leaf: B256,
    /// (a) identity is in the stored eligible list
    pub in_list: bool,
    /// (b) a proof is stored for it
    pub proof_present: bool,
    /// (c) the stored proof verifies against the stored root
    pub proof_verifies: bool,
    /// (d) stored root equals a rebuild of the stored list
    pub root_consistent: bool,
    /// (e) stored root equals the on-chain root; `None` if the chain was not consulted
    pub chain_root_matches: Option<bool>,
    pub stored_root: Option<B256>,
    pub recomputed_root: Option<B256>,
    pub chain_root: Option<B256>,
    pub consumed: Option<bool>,
}

impl Diagnosis {
    pub fn is_mintable(&self) -> bool {
        self.verdict().is_ok()
    }

    /// The first failing check as an error, in the order an operator should
    /// fix them: membership, store consistency, proof, chain sync, consumption.
    pub fn verdict(&self) -> Result<(), EligibilityError> {
        if !self.in_list {
            return Err(EligibilityError::NotEligible {
                campaign: self.campaign.clone(),
                identity: self.identity.clone(),
            });
        }
        if !self.root_consistent {
            return Err(EligibilityError::RootDrift {
                campaign: self.campaign.clone(),
                stored: self.stored_root,
                recomputed: self.recomputed_root,
            });
        }
        if !self.proof_present || !self.proof_verifies {
            return Err(EligibilityError::StaleProof {
                campaign: self.campaign.clone(),
                identity: self.identity.clone(),
            });
        }
        if let (Some(false), Some(stored), Some(chain)) =
            (self.chain_root_matches, self.stored_root, self.chain_root)
        {
            return Err(EligibilityError::ChainDrift {
                campaign: self.campaign.clone(),
                stored,
                chain,
            });
        }
        if self.consumed == Some(true) {
            return Err(EligibilityError::AlreadyConsumed(self.leaf));
        }
        Ok(())
    }
}

/// Run the checks against a campaign record and an optional chain view.
pub fn diagnose_record(
    campaign: &Campaign,
    identity: &Identity,
    chain: Option<ChainView>,
) -> Result<Diagnosis, EligibilityError> {
    let leaf = identity.leaf();
    let report = consistency_report(campaign);
    let stored = campaign.merkle_proofs.get(identity.as_str());

    let proof_verifies = match (stored, campaign.merkle_root) {
        (Some(path), Some(root)) => verify_proof(leaf, path, root),
        _ => false,
    };

    Ok(Diagnosis {
        campaign: campaign.id.clone(),
        identity: identity.to_string(),
        leaf,
        in_list: campaign.lists(identity.as_str()),
        proof_present: stored.is_some(),
        proof_verifies,
        root_consistent: report.root_consistent,
        chain_root_matches: chain.map(|view| Some(view.root) == campaign.merkle_root),
        stored_root: campaign.merkle_root,
        recomputed_root: report.recomputed_root,
        chain_root: chain.map(|view| view.root),
        consumed: chain.map(|view| view.consumed),
    })
}
