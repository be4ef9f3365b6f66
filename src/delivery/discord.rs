use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Ack, DeliveryError, DeliverySink};
use crate::error::{AppError, Result};
use crate::models::DeliveryConfig;
use crate::utils::{char_len, http};

/// Discord rejects message content longer than this.
pub const DISCORD_MESSAGE_LIMIT: usize = 2_000;

/// Posts messages to a Discord webhook.
#[derive(Clone)]
pub struct DiscordWebhook {
    webhook: String,
    client: Client,
    hard_limit: usize,
}

impl DiscordWebhook {
    pub fn new(webhook: String, client: Client) -> Self {
        Self {
            webhook,
            client,
            hard_limit: DISCORD_MESSAGE_LIMIT,
        }
    }

    /// Build from configuration. A missing webhook is a configuration error.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        let webhook = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::config("delivery.webhook_url is not set"))?;
        url::Url::parse(webhook)?;

        let client = http::create_delivery_client(config.timeout_secs)?;
        Ok(Self::new(webhook.to_string(), client)
            .with_hard_limit(config.hard_limit.min(DISCORD_MESSAGE_LIMIT)))
    }

    pub fn with_hard_limit(mut self, limit: usize) -> Self {
        self.hard_limit = limit;
        self
    }
}

#[async_trait]
impl DeliverySink for DiscordWebhook {
    fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    async fn deliver(&self, text: &str) -> std::result::Result<Ack, DeliveryError> {
        let len = char_len(text);
        if len > self.hard_limit {
            return Err(DeliveryError::TooLong {
                len,
                limit: self.hard_limit,
            });
        }

        let payload = DiscordWebhookPayload { content: text };
        let rsp = self
            .client
            .post(&self.webhook)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        log::debug!("Discord webhook accepted message ({} chars)", len);
        Ok(Ack {
            status: Some(status.as_u16()),
        })
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
}
