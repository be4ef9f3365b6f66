//! Persistence for cross-run state.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Configuration
//! ├── fingerprints.json     # Titles already delivered (SHA-256)
//! └── last_run.json         # Summary of the most recent run
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::RunSummary;

pub use local::LocalStorage;

/// Contents of `fingerprints.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSnapshot {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub fingerprints: Vec<String>,
}

impl FingerprintSnapshot {
    pub fn new(fingerprints: Vec<String>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: fingerprints.len(),
            fingerprints,
        }
    }
}

/// Backend that keeps delivered fingerprints and run summaries between
/// process restarts.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Fingerprints from the last save; empty when nothing was saved yet.
    async fn load_fingerprints(&self) -> Result<Vec<String>>;

    async fn save_fingerprints(&self, fingerprints: &[String]) -> Result<FingerprintSnapshot>;

    async fn save_summary(&self, summary: &RunSummary) -> Result<()>;

    async fn load_summary(&self) -> Result<Option<RunSummary>>;
}
