//! Classification verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The classifier stage that rejected a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Title too short or URL missing/invalid
    Malformed,
    /// Cookie banners, login prompts, pagination controls
    InterfaceNoise,
    /// Non-target profession without a strong domain signal
    ExcludedDomain,
    /// No domain term at all
    NoDomainSignal,
    /// Excluded experience level
    Seniority,
    /// Disallowed locality
    Locality,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::InterfaceNoise => "interface_noise",
            RejectReason::ExcludedDomain => "excluded_domain",
            RejectReason::NoDomainSignal => "no_domain_signal",
            RejectReason::Seniority => "seniority",
            RejectReason::Locality => "locality",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub reason: Option<RejectReason>,
}

impl Verdict {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}
