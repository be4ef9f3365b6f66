//! Candidate and posting data structures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::utils::normalize_whitespace;

/// Identifier of a listing source (e.g. `indeed`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One search request handed to a source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text search term
    pub term: String,

    /// Locality, e.g. "Salvador, BA"
    pub locality: String,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, locality: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            locality: locality.into(),
        }
    }

    /// The home locality term: first comma-separated segment, trimmed.
    pub fn home_locality(&self) -> Option<&str> {
        self.locality
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Unvalidated `(title, url)` pair as produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub title: String,
    pub url: String,
    pub source: SourceId,
}

impl RawCandidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: SourceId) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source,
        }
    }
}

/// Why a candidate failed structural validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("title has {len} characters, minimum is {min}")]
    TitleTooShort { len: usize, min: usize },

    #[error("url is empty")]
    MissingUrl,

    #[error("url '{0}' is not absolute")]
    InvalidUrl(String),

    #[error("url scheme '{0}' is not http(s)")]
    UnsupportedScheme(String),
}

/// A validated job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    title: String,
    url: String,
    source: SourceId,
}

impl Posting {
    /// Validate a raw candidate and normalize its title.
    pub fn from_candidate(
        candidate: &RawCandidate,
        min_title_chars: usize,
    ) -> Result<Self, CandidateError> {
        let title = normalize_whitespace(&candidate.title);
        let url = validate_url(&candidate.url)?;

        let len = title.chars().count();
        if len < min_title_chars {
            return Err(CandidateError::TitleTooShort {
                len,
                min: min_title_chars,
            });
        }

        Ok(Self {
            title,
            url,
            source: candidate.source.clone(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Format posting for display using a template.
    ///
    /// Supported placeholders: `{title}`, `{url}`, `{source}`. Placeholders
    /// appearing inside substituted values are left as they are.
    pub fn format(&self, template: &str) -> String {
        let fields = [
            ("{title}", self.title.as_str()),
            ("{url}", self.url.as_str()),
            ("{source}", self.source.as_str()),
        ];

        let mut out = String::with_capacity(template.len() + self.title.len() + self.url.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match fields.iter().find(|(key, _)| tail.starts_with(*key)) {
                Some((key, value)) => {
                    out.push_str(value);
                    rest = &tail[key.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Check that `raw` is an absolute http(s) URL and return it trimmed.
pub fn validate_url(raw: &str) -> Result<String, CandidateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CandidateError::MissingUrl);
    }
    let parsed = Url::parse(trimmed).map_err(|_| CandidateError::InvalidUrl(trimmed.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(CandidateError::UnsupportedScheme(other.to_string())),
    }
}
