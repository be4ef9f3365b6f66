//! Size-bounded message batching.
//!
//! Lengths are counted in characters, the unit webhook limits use.

use std::mem;

use crate::models::{DeliveryConfig, Posting};
use crate::utils::{char_len, truncate_graphemes};

/// One message worth of postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    header: String,
    blocks: Vec<String>,
    postings: Vec<Posting>,
    len: usize,
    truncated: usize,
}

impl Batch {
    fn new(header: String) -> Self {
        Self {
            len: char_len(&header),
            header,
            blocks: Vec::new(),
            postings: Vec::new(),
            truncated: 0,
        }
    }

    fn push(&mut self, posting: Posting, block: String) {
        self.len += char_len(&block);
        self.blocks.push(block);
        self.postings.push(posting);
    }

    /// The message text sent to the sink.
    pub fn text(&self) -> String {
        let mut text = self.header.clone();
        for block in &self.blocks {
            text.push_str(block);
        }
        text
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Rendered length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks that had to be cut to fit.
    pub fn truncated(&self) -> usize {
        self.truncated
    }
}

/// Packs postings into batches no longer than `hard_limit`.
#[derive(Debug, Clone)]
pub struct BatchFormatter {
    header: String,
    continuation_header: String,
    block: String,
    truncation_marker: String,
    hard_limit: usize,
}

impl BatchFormatter {
    pub fn new(hard_limit: usize) -> Self {
        Self::from_config(&DeliveryConfig {
            hard_limit,
            ..DeliveryConfig::default()
        })
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            header: config.header.clone(),
            continuation_header: config.continuation_header.clone(),
            block: config.block.clone(),
            truncation_marker: config.truncation_marker.clone(),
            hard_limit: config.hard_limit,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_continuation_header(mut self, header: impl Into<String>) -> Self {
        self.continuation_header = header.into();
        self
    }

    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.block = block.into();
        self
    }

    pub fn with_truncation_marker(mut self, marker: impl Into<String>) -> Self {
        self.truncation_marker = marker.into();
        self
    }

    pub fn with_hard_limit(mut self, limit: usize) -> Self {
        self.hard_limit = limit;
        self
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    /// Render postings into batches, preserving input order.
    pub fn format(&self, postings: &[Posting]) -> Vec<Batch> {
        if postings.is_empty() {
            return Vec::new();
        }

        let mut batches = Vec::new();
        let mut current = Batch::new(self.header.replace("{count}", &postings.len().to_string()));

        for posting in postings {
            let mut block = posting.format(&self.block);
            let mut block_len = char_len(&block);

            if current.len + block_len > self.hard_limit && !current.is_empty() {
                let page = batches.len() + 2;
                let next = Batch::new(self.continuation_header.replace("{page}", &page.to_string()));
                batches.push(mem::replace(&mut current, next));
            }

            if current.len + block_len > self.hard_limit {
                let room = self.hard_limit.saturating_sub(current.len);
                block = self.truncate(&block, room);
                block_len = char_len(&block);
                current.truncated += 1;
                log::warn!(
                    "Posting '{}' does not fit in one message, truncated to {} chars",
                    posting.title(),
                    block_len
                );
            }

            current.push(posting.clone(), block);
        }

        batches.push(current);
        batches
    }

    /// Cut `block` to `room` characters including the truncation marker.
    fn truncate(&self, block: &str, room: usize) -> String {
        let keep = room.saturating_sub(char_len(&self.truncation_marker));
        let cut = format!("{}{}", truncate_graphemes(block, keep), self.truncation_marker);
        if char_len(&cut) <= room {
            cut
        } else {
            truncate_graphemes(&cut, room).to_string()
        }
    }
}
