use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::campaign::Campaign;
use crate::ports::store::{CampaignStore, StoreError};

/// In-memory implementation of `CampaignStore` for tests and the demo.
///
/// Each `put` swaps the whole record under one lock, which is what makes a
/// write atomic here.
pub struct InMemoryCampaignStore {
    campaigns: Mutex<HashMap<String, Campaign>>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrite a record without any checks. Lets tests simulate an
    /// out-of-band edit that skipped the recompute.
    pub async fn force_put(&self, campaign: Campaign) {
        self.campaigns
            .lock()
            .await
            .insert(campaign.id.clone(), campaign);
    }
}

impl Default for InMemoryCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignStore for InMemoryCampaignStore {
    async fn get(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.lock().await.get(id).cloned())
    }

    async fn insert(&self, campaign: Campaign) -> Result<(), StoreError> {
        let mut campaigns = self.campaigns.lock().await;
        if campaigns.contains_key(&campaign.id) {
            return Err(StoreError::AlreadyExists(campaign.id));
        }
        campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }

    async fn put(&self, campaign: Campaign) -> Result<(), StoreError> {
        let mut campaigns = self.campaigns.lock().await;
        match campaigns.get_mut(&campaign.id) {
            Some(slot) => {
                *slot = campaign;
                Ok(())
            }
            None => Err(StoreError::NotFound(campaign.id)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.campaigns.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.campaigns
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::NewCampaign;

    fn campaign(id: &str) -> Campaign {
        Campaign::new(NewCampaign {
            id: id.into(),
            name: format!("{id} name"),
            network: "sepolia".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = InMemoryCampaignStore::new();
        store.insert(campaign("eth-global")).await.unwrap();
        let fetched = store.get("eth-global").await.unwrap().unwrap();
        assert_eq!(fetched.name, "eth-global name");
    }

    #[tokio::test]
    async fn insert_duplicate_fails() {
        let store = InMemoryCampaignStore::new();
        store.insert(campaign("dup")).await.unwrap();
        let err = store.insert(campaign("dup")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(id) if id == "dup"));
    }

    #[tokio::test]
    async fn put_requires_existing() {
        let store = InMemoryCampaignStore::new();
        let err = store.put(campaign("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_replaces_record() {
        let store = InMemoryCampaignStore::new();
        store.insert(campaign("c1")).await.unwrap();
        let mut updated = campaign("c1");
        updated.closed = true;
        store.put(updated).await.unwrap();
        assert!(store.get("c1").await.unwrap().unwrap().closed);
    }

    #[tokio::test]
    async fn list_is_sorted_and_delete_removes() {
        let store = InMemoryCampaignStore::new();
        store.insert(campaign("b")).await.unwrap();
        store.insert(campaign("a")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["b"]);
        assert!(store.delete("a").await.is_err());
    }
}
