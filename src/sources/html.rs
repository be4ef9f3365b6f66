// src/sources/html.rs

//! Selector-driven HTML listing adapter.
//!
//! Renders the configured search URL, downloads the result page and pulls
//! `(title, link)` pairs out of it with the first selector that matches.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawCandidate, SearchQuery, SourceConfig, SourceId};
use crate::sources::{FetchCause, FetchError, SourceAdapter};
use crate::utils::{normalize_whitespace, resolve_url, truncate_graphemes};

/// Adapter for a listing site described by a [`SourceConfig`].
pub struct HtmlSource {
    id: SourceId,
    config: SourceConfig,
    selectors: Vec<(String, Selector)>,
    client: Client,
}

impl HtmlSource {
    /// Build an adapter, parsing its selectors up front.
    pub fn new(config: SourceConfig, client: Client) -> Result<Self> {
        let selectors = config
            .selectors
            .iter()
            .map(|s| Self::parse_selector(s).map(|sel| (s.clone(), sel)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: SourceId::new(&config.id),
            config,
            selectors,
            client,
        })
    }

    /// Render the search URL for a query.
    pub fn search_url(&self, query: &SearchQuery) -> String {
        self.config
            .url_template
            .replace("{term}", &self.encode(&query.term))
            .replace("{locality}", &self.encode(&query.locality))
    }

    /// Percent-encode each word and join the words with the source's separator.
    fn encode(&self, value: &str) -> String {
        value
            .split_whitespace()
            .map(|word| url::form_urlencoded::byte_serialize(word.as_bytes()).collect::<String>())
            .collect::<Vec<_>>()
            .join(&self.config.space)
    }

    /// Extract candidates from a result page.
    pub fn extract(&self, html: &str, page_url: &Url) -> Vec<RawCandidate> {
        let document = Html::parse_document(html);

        for (raw, selector) in &self.selectors {
            let matches: Vec<ElementRef> = document.select(selector).collect();
            if matches.is_empty() {
                continue;
            }
            log::debug!("{}: {} matches with {}", self.id, matches.len(), raw);

            return matches
                .into_iter()
                .take(self.config.limit)
                .filter_map(|element| self.parse_candidate(&element, page_url))
                .collect();
        }

        log::debug!("{}: no selector matched", self.id);
        Vec::new()
    }

    fn parse_candidate(&self, element: &ElementRef, page_url: &Url) -> Option<RawCandidate> {
        let raw_title: String = element.text().collect();
        let mut title = normalize_whitespace(&raw_title);
        if let Some(max) = self.config.max_title_chars {
            title = truncate_graphemes(&title, max).trim_end().to_string();
        }

        // Title elements are often wrapped by the anchor rather than being one
        let href = element.value().attr(&self.config.link_attr).or_else(|| {
            element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find_map(|a| a.value().attr(&self.config.link_attr))
        })?;

        Some(RawCandidate::new(
            title,
            resolve_url(page_url, href.trim()),
            self.id.clone(),
        ))
    }

    fn fail(&self, cause: FetchCause) -> FetchError {
        FetchError::new(self.id.clone(), cause)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[async_trait]
impl SourceAdapter for HtmlSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn search(&self, query: &SearchQuery) -> std::result::Result<Vec<RawCandidate>, FetchError> {
        let url = self.search_url(query);
        log::info!("{}: fetching {}", self.id, url);

        let page_url =
            Url::parse(&url).map_err(|e| self.fail(FetchCause::Other(e.to_string())))?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| self.fail(FetchCause::Http(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.fail(FetchCause::Status(status.as_u16())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| self.fail(FetchCause::Http(e.to_string())))?;

        let candidates = self.extract(&html, &page_url);
        log::info!("{}: {} candidates", self.id, candidates.len());
        Ok(candidates)
    }
}
