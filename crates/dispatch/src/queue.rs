//! Outbound message queue. The e-mail delivery worker consumes from here.

use async_trait::async_trait;
use courier_core::config::NatsConfig;
use courier_core::types::OutboundEmailMessage;
use dashmap::{DashMap, DashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue cannot accept anything right now. Fails the whole segment.
    #[error("queue {queue} unavailable: {reason}")]
    Unavailable { queue: String, reason: String },

    /// This particular message was refused. Only the one customer is skipped.
    #[error("message rejected by {queue}: {reason}")]
    Rejected { queue: String, reason: String },
}

#[async_trait]
pub trait OutboundQueue: Send + Sync {
    async fn enqueue(&self, queue: &str, message: &OutboundEmailMessage) -> Result<(), QueueError>;

    /// Push buffered messages to the broker.
    async fn flush(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

// ─── NATS ──────────────────────────────────────────────────────────────────

/// Publishes JSON messages on a NATS subject per queue.
pub struct NatsQueue {
    client: async_nats::Client,
}

impl NatsQueue {
    pub async fn connect(config: &NatsConfig) -> anyhow::Result<Self> {
        let nats_url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        info!(url = %nats_url, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .max_reconnects(Some(config.max_reconnects))
            .connect(&nats_url)
            .await?;

        info!("NATS connection established");

        Ok(Self { client })
    }
}

#[async_trait]
impl OutboundQueue for NatsQueue {
    async fn enqueue(&self, queue: &str, message: &OutboundEmailMessage) -> Result<(), QueueError> {
        if matches!(
            self.client.connection_state(),
            async_nats::connection::State::Disconnected
        ) {
            return Err(QueueError::Unavailable {
                queue: queue.to_string(),
                reason: "NATS connection lost".to_string(),
            });
        }

        let payload = serde_json::to_vec(message).map_err(|e| QueueError::Rejected {
            queue: queue.to_string(),
            reason: e.to_string(),
        })?;

        self.client
            .publish(queue.to_string(), payload.into())
            .await
            .map_err(|e| QueueError::Unavailable {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        debug!(queue = %queue, to = %message.recipient, "Message published");
        Ok(())
    }

    async fn flush(&self) -> Result<(), QueueError> {
        self.client
            .flush()
            .await
            .map_err(|e| QueueError::Unavailable {
                queue: "*".to_string(),
                reason: e.to_string(),
            })
    }
}

// ─── In-memory ─────────────────────────────────────────────────────────────

/// Queue backed by DashMap for development and tests. Supports failure
/// injection per recipient or per queue, and artificial latency.
#[derive(Default)]
pub struct InMemoryQueue {
    messages: DashMap<String, Vec<OutboundEmailMessage>>,
    rejected_recipients: DashSet<String>,
    unavailable_queues: DashSet<String>,
    delays: DashMap<String, Duration>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every message addressed to `recipient`.
    pub fn reject_recipient(&self, recipient: impl Into<String>) {
        self.rejected_recipients.insert(recipient.into());
    }

    /// Report `queue` as unavailable on every enqueue.
    pub fn mark_unavailable(&self, queue: impl Into<String>) {
        self.unavailable_queues.insert(queue.into());
    }

    /// Sleep for `delay` before accepting each message on `queue`.
    pub fn delay_queue(&self, queue: impl Into<String>, delay: Duration) {
        self.delays.insert(queue.into(), delay);
    }

    pub fn messages(&self, queue: &str) -> Vec<OutboundEmailMessage> {
        self.messages
            .get(queue)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl OutboundQueue for InMemoryQueue {
    async fn enqueue(&self, queue: &str, message: &OutboundEmailMessage) -> Result<(), QueueError> {
        let delay = self.delays.get(queue).map(|d| *d.value());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable_queues.contains(queue) {
            return Err(QueueError::Unavailable {
                queue: queue.to_string(),
                reason: "queue marked unavailable".to_string(),
            });
        }
        if self.rejected_recipients.contains(&message.recipient) {
            return Err(QueueError::Rejected {
                queue: queue.to_string(),
                reason: format!("recipient {} refused", message.recipient),
            });
        }

        self.messages
            .entry(queue.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
