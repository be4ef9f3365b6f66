//! Run statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RejectReason, SourceId};

/// Per-source counters for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: SourceId,
    /// Candidates returned by the adapter
    pub raw: usize,
    /// Candidates that passed classification
    pub accepted: usize,
    /// Accepted postings not seen before
    pub novel: usize,
    /// Adapter invocations made
    pub attempts: u32,
    /// Invocations that errored or timed out
    pub failed_attempts: u32,
    /// All attempts failed
    pub exhausted: bool,
    /// Fetch aborted by cancellation
    pub cancelled: bool,
}

impl SourceStats {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            raw: 0,
            accepted: 0,
            novel: 0,
            attempts: 0,
            failed_attempts: 0,
            exhausted: false,
            cancelled: false,
        }
    }
}

/// Structured record emitted at the end of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_tried: usize,
    pub raw_total: usize,
    /// Candidates dropped at structural validation
    pub invalid: usize,
    pub accepted: usize,
    pub novel: usize,
    pub batches_sent: usize,
    pub delivery_failures: usize,
    pub no_results_sent: bool,
    pub cancelled: bool,
    /// Sources that exhausted their retries
    pub failures: Vec<SourceId>,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub sources: Vec<SourceStats>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            sources_tried: 0,
            raw_total: 0,
            invalid: 0,
            accepted: 0,
            novel: 0,
            batches_sent: 0,
            delivery_failures: 0,
            no_results_sent: false,
            cancelled: false,
            failures: Vec::new(),
            rejected: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    /// Stats for one source, if it was part of the run.
    pub fn source(&self, id: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.source.as_str() == id)
    }

    /// Number of candidates rejected at a given stage.
    pub fn rejected_by(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }

    /// True when every delivery attempt succeeded and no source was exhausted.
    pub fn is_clean(&self) -> bool {
        self.delivery_failures == 0 && self.failures.is_empty() && !self.cancelled
    }
}
