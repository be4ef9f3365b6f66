use async_trait::async_trait;

use super::{Ack, DeliveryError, DeliverySink};

/// Dry-run sink: logs messages instead of sending them.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    hard_limit: usize,
}

impl ConsoleSink {
    pub fn new(hard_limit: usize) -> Self {
        Self { hard_limit }
    }
}

#[async_trait]
impl DeliverySink for ConsoleSink {
    fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    async fn deliver(&self, text: &str) -> Result<Ack, DeliveryError> {
        log::info!("[dry-run] message ({} chars):\n{}", text.chars().count(), text);
        Ok(Ack { status: None })
    }
}
