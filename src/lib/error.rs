use alloy_primitives::B256;

use crate::domain::identity::InvalidIdentity;
use crate::domain::merkle::TreeError;
use crate::ports::mint_gate::MintGateError;
use crate::ports::store::StoreError;

/// Errors surfaced by the eligibility registry, root sync and diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    /// Identity is not in the campaign's leaf set. Expected, user-facing.
    #[error("{identity} is not eligible for campaign {campaign}")]
    NotEligible { campaign: String, identity: String },

    /// A stored proof does not verify against the stored root.
    #[error("stored proof for {identity} in campaign {campaign} does not verify against the stored root")]
    StaleProof { campaign: String, identity: String },

    /// Stored root differs from the root rebuilt from the stored list.
    #[error("campaign {campaign}: stored root {stored:?} does not match recomputed root {recomputed:?}")]
    RootDrift {
        campaign: String,
        stored: Option<B256>,
        recomputed: Option<B256>,
    },

    /// Stored root differs from the mint gate's active root.
    #[error("campaign {campaign}: stored root {stored} differs from on-chain root {chain}; push the root")]
    ChainDrift {
        campaign: String,
        stored: B256,
        chain: B256,
    },

    /// The leaf has already minted on chain. Not retryable.
    #[error("leaf {0} has already minted")]
    AlreadyConsumed(B256),

    #[error(transparent)]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("campaign {0} would have no eligible identities")]
    EmptyEligibilitySet(String),

    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("campaign already exists: {0}")]
    CampaignExists(String),

    /// Identity edits are refused once minting has begun or the campaign is closed.
    #[error("campaign {campaign} is locked: {reason}")]
    CampaignLocked {
        campaign: String,
        reason: &'static str,
    },

    #[error("campaign {0} has no mint gate configured")]
    NoMintGate(String),

    #[error("chain call timed out: {0}")]
    ChainTimeout(&'static str),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("chain error: {0}")]
    Chain(MintGateError),
}

impl From<StoreError> for EligibilityError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EligibilityError::CampaignNotFound(id),
            StoreError::AlreadyExists(id) => EligibilityError::CampaignExists(id),
            other => EligibilityError::Store(other),
        }
    }
}

impl From<MintGateError> for EligibilityError {
    fn from(e: MintGateError) -> Self {
        match e {
            MintGateError::AlreadyConsumed(leaf) => EligibilityError::AlreadyConsumed(leaf),
            other => EligibilityError::Chain(other),
        }
    }
}

impl EligibilityError {
    pub(crate) fn from_tree(campaign: &str, e: TreeError) -> Self {
        match e {
            TreeError::Empty => EligibilityError::EmptyEligibilitySet(campaign.to_string()),
        }
    }
}
