use std::{
    io::ErrorKind,
    path::PathBuf,
    time::Duration,
};

use async_trait::async_trait;
use fred::prelude::*;
use tracing::error;

use crate::error::StoreError;

/// Durable key-value storage for serialized snapshots, one blob per interval.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing was ever saved under `key`.
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Stores each blob as `<dir>/indicators_<key>.json`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("indicators_{key}.json"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        // same directory, so the rename is atomic
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Stores each blob under `<prefix>:indicators:<key>`.
#[derive(Clone)]
pub struct RedisBlobStore {
    client: Client,
    key_prefix: String,
}

impl RedisBlobStore {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let config = Config::from_url(redis_url)?;

        let client = Builder::from_config(config)
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(5);
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!(?server, %error, "Redis connection error");
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: key.into(),
        })
    }

    fn blob_key(&self, key: &str) -> String {
        format!("{}:indicators:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl BlobStore for RedisBlobStore {
    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let _: () = self
            .client
            .set(self.blob_key(key), blob, None, None, false)
            .await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let blob: Option<String> = self.client.get(self.blob_key(key)).await?;
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert_eq!(store.load("15m").await.unwrap(), None);

        store.save("15m", "{\"rows\":[]}").await.unwrap();
        assert_eq!(
            store.load("15m").await.unwrap().as_deref(),
            Some("{\"rows\":[]}")
        );
        assert!(dir.path().join("indicators_15m.json").exists());
        assert!(!dir.path().join("indicators_15m.json.tmp").exists());
    }

    #[tokio::test]
    async fn fs_save_overwrites_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("nested"));

        store.save("1h", "old").await.unwrap();
        store.save("1h", "new").await.unwrap();
        assert_eq!(store.load("1h").await.unwrap().as_deref(), Some("new"));
    }
}
