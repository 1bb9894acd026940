use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{DB, Options};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifetime of the "wallet was connected" marker (seven days).
pub const CONNECTION_MARKER_TTL_MS: u128 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMarker {
    pub wallet_address: String,
    pub connected_at_epoch_ms: u128,
    pub expires_at_epoch_ms: u128,
}

impl ConnectionMarker {
    pub fn issue(wallet_address: &str, now_epoch_ms: u128) -> Self {
        Self {
            wallet_address: wallet_address.to_owned(),
            connected_at_epoch_ms: now_epoch_ms,
            expires_at_epoch_ms: now_epoch_ms + CONNECTION_MARKER_TTL_MS,
        }
    }

    pub fn is_active(&self, now_epoch_ms: u128) -> bool {
        now_epoch_ms < self.expires_at_epoch_ms
    }
}

/// Client-side state that outlives a session: the connection marker and the
/// local record of which posts this client has edited.
///
/// Neither is authoritative. The edited set in particular is never
/// reconciled with the contract.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn save_connection_marker(&self, marker: &ConnectionMarker) -> Result<()>;
    async fn load_connection_marker(&self) -> Result<Option<ConnectionMarker>>;
    async fn clear_connection_marker(&self) -> Result<()>;
    async fn mark_post_edited(&self, post_id: &str) -> Result<()>;
    async fn is_post_edited(&self, post_id: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryClientStore {
    marker: RwLock<Option<ConnectionMarker>>,
    edited: RwLock<HashSet<String>>,
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn save_connection_marker(&self, marker: &ConnectionMarker) -> Result<()> {
        let mut guard = self.marker.write().await;
        *guard = Some(marker.clone());
        Ok(())
    }

    async fn load_connection_marker(&self) -> Result<Option<ConnectionMarker>> {
        let guard = self.marker.read().await;
        Ok(guard.clone())
    }

    async fn clear_connection_marker(&self) -> Result<()> {
        let mut guard = self.marker.write().await;
        *guard = None;
        Ok(())
    }

    async fn mark_post_edited(&self, post_id: &str) -> Result<()> {
        let mut guard = self.edited.write().await;
        guard.insert(post_id.to_owned());
        Ok(())
    }

    async fn is_post_edited(&self, post_id: &str) -> Result<bool> {
        let guard = self.edited.read().await;
        Ok(guard.contains(post_id))
    }
}

pub struct RocksDbClientStore {
    db: Arc<DB>,
}

const CONNECTION_MARKER_KEY: &str = "wallet-connected";

impl RocksDbClientStore {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn key_for_edited_post(post_id: &str) -> String {
        format!("edited-post:{post_id}")
    }
}

#[async_trait]
impl ClientStore for RocksDbClientStore {
    async fn save_connection_marker(&self, marker: &ConnectionMarker) -> Result<()> {
        let value = serde_json::to_vec(marker)?;
        self.db.put(CONNECTION_MARKER_KEY.as_bytes(), value)?;
        Ok(())
    }

    async fn load_connection_marker(&self) -> Result<Option<ConnectionMarker>> {
        let value = self.db.get(CONNECTION_MARKER_KEY.as_bytes())?;
        match value {
            Some(raw) => Ok(Some(serde_json::from_slice::<ConnectionMarker>(&raw)?)),
            None => Ok(None),
        }
    }

    async fn clear_connection_marker(&self) -> Result<()> {
        self.db.delete(CONNECTION_MARKER_KEY.as_bytes())?;
        Ok(())
    }

    async fn mark_post_edited(&self, post_id: &str) -> Result<()> {
        let key = Self::key_for_edited_post(post_id);
        self.db.put(key.as_bytes(), b"1")?;
        Ok(())
    }

    async fn is_post_edited(&self, post_id: &str) -> Result<bool> {
        let key = Self::key_for_edited_post(post_id);
        Ok(self.db.get(key.as_bytes())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_expires_after_seven_days() {
        let marker = ConnectionMarker::issue("0xabc", 1_000);
        assert!(marker.is_active(1_000 + CONNECTION_MARKER_TTL_MS - 1));
        assert!(!marker.is_active(1_000 + CONNECTION_MARKER_TTL_MS));
    }

    #[tokio::test]
    async fn in_memory_marker_lifecycle() -> anyhow::Result<()> {
        let store = InMemoryClientStore::default();
        assert!(store.load_connection_marker().await?.is_none());

        let marker = ConnectionMarker::issue("0xabc", 5);
        store.save_connection_marker(&marker).await?;
        assert_eq!(store.load_connection_marker().await?, Some(marker));

        store.clear_connection_marker().await?;
        assert!(store.load_connection_marker().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn rocksdb_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_str().unwrap_or_default().to_owned();

        {
            let store = RocksDbClientStore::open_default(&path)?;
            store
                .save_connection_marker(&ConnectionMarker::issue("0xabc", 5))
                .await?;
            store.mark_post_edited("3").await?;
        }

        let store = RocksDbClientStore::open_default(&path)?;
        let marker = store
            .load_connection_marker()
            .await?
            .expect("marker should persist");
        assert_eq!(marker.wallet_address, "0xabc");
        assert!(store.is_post_edited("3").await?);
        assert!(!store.is_post_edited("4").await?);

        store.clear_connection_marker().await?;
        assert!(store.load_connection_marker().await?.is_none());
        Ok(())
    }
}
