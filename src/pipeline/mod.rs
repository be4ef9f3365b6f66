//! Pipeline stages for one scouting run.
//!
//! - `fetch`: retries, timeouts and rate limiting around each source
//! - `classify`: ordered rule pipeline over raw candidates
//! - `dedup`: cross-run fingerprint set
//! - `batch`: size-bounded message batching
//! - `orchestrator`: runs the stages end to end

pub mod batch;
pub mod classify;
pub mod dedup;
pub mod fetch;
pub mod orchestrator;
pub mod rate_limit;

pub use batch::{Batch, BatchFormatter};
pub use classify::{Classifier, Locality, TermSet, fold};
pub use dedup::{FingerprintSet, fingerprint};
pub use fetch::{FetchExecutor, FetchOutcome, RetryPolicy};
pub use orchestrator::{Orchestrator, RunState};
pub use rate_limit::RateLimiter;
