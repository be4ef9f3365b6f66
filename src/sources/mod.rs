//! Source adapters.
//!
//! An adapter turns a [`SearchQuery`] into raw `(title, url)` candidates for a
//! single listing site. The pipeline never looks behind this trait, so the
//! fetch technology (plain HTTP, a headless browser, an API) stays an adapter
//! detail.
//!
//! Adapters own whatever they allocate (HTTP connections, browser sessions)
//! through RAII guards. The fetch executor drops an in-flight `search` future
//! on timeout or cancellation, which must be enough to release them.

mod html;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{RawCandidate, SearchQuery, SourceId};

pub use html::HtmlSource;

/// Why an adapter invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchCause {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Unrecoverable failure of one adapter invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fetch from {source_id} failed: {cause}")]
pub struct FetchError {
    pub source_id: SourceId,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(source_id: SourceId, cause: FetchCause) -> Self {
        Self { source_id, cause }
    }
}

/// A pluggable per-source fetch strategy.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifier used in statistics and rate limiting.
    fn id(&self) -> &SourceId;

    /// Run one search. An empty `Ok` is a legitimate "nothing listed".
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawCandidate>, FetchError>;
}
