// src/models/mod.rs

//! Domain models for the job aggregation pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod posting;
mod summary;
mod verdict;

// Re-export all public types
pub use config::{
    ClassifierConfig, Config, DedupConfig, DeliveryConfig, ENV_WEBHOOK_URL, FetchConfig,
    FetchMode, SearchConfig, SourceConfig,
};
pub use posting::{CandidateError, Posting, RawCandidate, SearchQuery, SourceId, validate_url};
pub use summary::{RunSummary, SourceStats};
pub use verdict::{RejectReason, Verdict};
