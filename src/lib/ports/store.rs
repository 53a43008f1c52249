use std::future::Future;

use crate::domain::campaign::Campaign;

/// Port for persisting campaign records.
///
/// `put` replaces the whole record in one write, so a reader never sees a
/// root from one recompute next to proofs from another. Serializing
/// read-modify-write cycles per campaign is the caller's job
/// (see `EligibilityRegistry`).
///
/// Implementations:
/// - `InMemoryCampaignStore` (tests, demo)
/// - `FileCampaignStore` (one JSON document per campaign)
pub trait CampaignStore: Send + Sync {
    /// Fetch a campaign by id.
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Campaign>, StoreError>> + Send;

    /// Create a campaign. Fails if the id is taken.
    fn insert(
        &self,
        campaign: Campaign,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically replace an existing campaign record.
    fn put(
        &self,
        campaign: Campaign,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Ids of all stored campaigns, sorted.
    fn list(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("campaign not found: {0}")]
    NotFound(String),

    #[error("campaign already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid campaign id: {0:?}")]
    InvalidId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt campaign record: {0}")]
    Corrupt(#[from] serde_json::Error),
}
