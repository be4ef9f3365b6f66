//! Delivery sinks.
//!
//! A sink accepts one pre-formatted message at a time. Delivery is
//! best-effort and at-most-once: callers retry once at most.

mod console;
mod discord;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use console::ConsoleSink;
pub use discord::{DISCORD_MESSAGE_LIMIT, DiscordWebhook};

/// Acknowledgement returned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// HTTP status when the sink is HTTP based
    pub status: Option<u16>,
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),

    #[error("sink rejected message with status {status}")]
    Rejected { status: u16 },

    #[error("message has {len} characters, limit is {limit}")]
    TooLong { len: usize, limit: usize },
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Largest message, in characters, the sink accepts.
    fn hard_limit(&self) -> usize;

    async fn deliver(&self, text: &str) -> Result<Ack, DeliveryError>;
}

/// Deliver once, and once more after `retry_delay` if the first try fails.
pub async fn deliver_with_retry(
    sink: &dyn DeliverySink,
    text: &str,
    retry_delay: Duration,
) -> Result<Ack, DeliveryError> {
    match sink.deliver(text).await {
        Ok(ack) => Ok(ack),
        Err(DeliveryError::TooLong { len, limit }) => Err(DeliveryError::TooLong { len, limit }),
        Err(first) => {
            log::warn!("Delivery failed ({}), retrying in {:?}", first, retry_delay);
            tokio::time::sleep(retry_delay).await;
            sink.deliver(text).await
        }
    }
}
