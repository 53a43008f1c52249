use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::domain::campaign::Campaign;
use crate::ports::store::{CampaignStore, StoreError};

/// `CampaignStore` backed by one JSON document per campaign under `root`.
///
/// Writes go to `<id>.json.tmp` and are renamed over `<id>.json`, so a crash
/// mid-write leaves the previous record intact.
pub struct FileCampaignStore {
    root: PathBuf,
}

impl FileCampaignStore {
    /// Open (and create if missing) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    async fn write_atomic(&self, path: &Path, campaign: &Campaign) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(campaign)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        debug!(campaign = %campaign.id, path = %path.display(), "campaign record written");
        Ok(())
    }
}

impl CampaignStore for FileCampaignStore {
    async fn get(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        let path = self.path_for(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, campaign: Campaign) -> Result<(), StoreError> {
        let path = self.path_for(&campaign.id)?;
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(campaign.id));
        }
        self.write_atomic(&path, &campaign).await
    }

    async fn put(&self, campaign: Campaign) -> Result<(), StoreError> {
        let path = self.path_for(&campaign.id)?;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(campaign.id));
        }
        self.write_atomic(&path, &campaign).await
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
