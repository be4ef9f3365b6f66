//! Local filesystem storage.
//!
//! Every file is written to a `.tmp` sibling first and renamed into place,
//! so a crash mid-write leaves the previous version intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::RunSummary;
use crate::storage::{FingerprintSnapshot, FingerprintStore};

const FINGERPRINTS_KEY: &str = "fingerprints.json";
const SUMMARY_KEY: &str = "last_run.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FingerprintStore for LocalStorage {
    async fn load_fingerprints(&self) -> Result<Vec<String>> {
        match self.read_json::<FingerprintSnapshot>(FINGERPRINTS_KEY).await? {
            Some(snapshot) => {
                log::info!(
                    "Loaded {} fingerprints saved at {}",
                    snapshot.fingerprints.len(),
                    snapshot.updated_at
                );
                Ok(snapshot.fingerprints)
            }
            None => {
                log::info!("No {} found, starting with an empty set", FINGERPRINTS_KEY);
                Ok(Vec::new())
            }
        }
    }

    async fn save_fingerprints(&self, fingerprints: &[String]) -> Result<FingerprintSnapshot> {
        let snapshot = FingerprintSnapshot::new(fingerprints.to_vec());
        self.write_json(FINGERPRINTS_KEY, &snapshot).await?;
        log::debug!("Saved {} fingerprints", snapshot.count);
        Ok(snapshot)
    }

    async fn save_summary(&self, summary: &RunSummary) -> Result<()> {
        self.write_json(SUMMARY_KEY, summary).await
    }

    async fn load_summary(&self) -> Result<Option<RunSummary>> {
        self.read_json(SUMMARY_KEY).await
    }
}
