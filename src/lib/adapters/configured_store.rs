use crate::adapters::file_store::FileCampaignStore;
use crate::adapters::memory_store::InMemoryCampaignStore;
use crate::config::{StoreBackend, StoreConfig};
use crate::domain::campaign::Campaign;
use crate::ports::store::{CampaignStore, StoreError};

/// Store selected at startup from `[store]` in the config.
pub enum ConfiguredStore {
    Memory(InMemoryCampaignStore),
    File(FileCampaignStore),
}

impl ConfiguredStore {
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match (config.backend, &config.data_dir) {
            (StoreBackend::Memory, _) => Ok(Self::Memory(InMemoryCampaignStore::new())),
            (StoreBackend::File, Some(dir)) => {
                Ok(Self::File(FileCampaignStore::open(dir.clone()).await?))
            }
            (StoreBackend::File, None) => Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "store.data_dir is required for the file backend",
            ))),
        }
    }
}

impl CampaignStore for ConfiguredStore {
    async fn get(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        match self {
            Self::Memory(store) => store.get(id).await,
            Self::File(store) => store.get(id).await,
        }
    }

    async fn insert(&self, campaign: Campaign) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.insert(campaign).await,
            Self::File(store) => store.insert(campaign).await,
        }
    }

    async fn put(&self, campaign: Campaign) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put(campaign).await,
            Self::File(store) => store.put(campaign).await,
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Memory(store) => store.list().await,
            Self::File(store) => store.list().await,
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.delete(id).await,
            Self::File(store) => store.delete(id).await,
        }
    }
}
