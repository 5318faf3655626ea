//! Personalizes and enqueues one message per customer of a single segment.

use crate::personalizer::personalize;
use crate::queue::{OutboundQueue, QueueError};
use crate::router::QueueRouter;
use chrono::Utc;
use courier_core::types::{Campaign, Customer, OutboundEmailMessage, Segment, SegmentResult};
use courier_core::{CourierError, CourierResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SegmentProcessor {
    router: QueueRouter,
    queue: Arc<dyn OutboundQueue>,
}

impl SegmentProcessor {
    pub fn new(router: QueueRouter, queue: Arc<dyn OutboundQueue>) -> Self {
        Self { router, queue }
    }

    /// Process every customer of `segment` in order.
    ///
    /// A customer whose message cannot be built or is refused by the queue is
    /// logged, listed in `failed_customers` and skipped. An unavailable queue
    /// aborts the segment with `SegmentProcessing`.
    pub async fn process(&self, campaign: &Campaign, segment: &Segment) -> CourierResult<SegmentResult> {
        let queue = self.router.route(segment.tag);

        info!(
            campaign_id = %campaign.id,
            segment = %segment.label,
            customers = segment.customers.len(),
            queue = %queue,
            "Processing segment"
        );

        let mut enqueued = 0usize;
        let mut failed_customers = Vec::new();

        for customer in &segment.customers {
            match self.deliver(campaign, segment, customer, queue).await {
                Ok(()) => enqueued += 1,
                Err(CourierError::CustomerMessage { customer, reason }) => {
                    warn!(
                        campaign_id = %campaign.id,
                        segment = %segment.label,
                        customer = %customer,
                        reason = %reason,
                        "Skipping customer"
                    );
                    metrics::counter!("dispatch.customer_failures").increment(1);
                    failed_customers.push(customer);
                }
                Err(e) => return Err(e),
            }
        }

        if let Err(e) = self.queue.flush().await {
            warn!(segment = %segment.label, error = %e, "Queue flush failed");
        }

        metrics::counter!(
            "dispatch.messages_enqueued",
            "segment" => segment.tag.as_str()
        )
        .increment(enqueued as u64);

        Ok(SegmentResult {
            segment: segment.label.clone(),
            customers_targeted: segment.customers.len(),
            messages_enqueued: enqueued,
            queue: Some(queue.to_string()),
            error: None,
            failed_customers,
        })
    }

    async fn deliver(
        &self,
        campaign: &Campaign,
        segment: &Segment,
        customer: &Customer,
        queue: &str,
    ) -> CourierResult<()> {
        let recipient = match customer.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => {
                return Err(CourierError::CustomerMessage {
                    customer: customer.log_id().to_string(),
                    reason: "missing e-mail address".to_string(),
                })
            }
        };

        let message = OutboundEmailMessage {
            recipient,
            subject: campaign.subject.clone(),
            body: personalize(&campaign.body, customer, segment.tag),
            campaign_id: campaign.id,
            segment: segment.label.clone(),
            customer_id: customer.id.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };

        match self.queue.enqueue(queue, &message).await {
            Ok(()) => {
                debug!(queue = %queue, to = %message.recipient, "Message enqueued");
                Ok(())
            }
            Err(e @ QueueError::Rejected { .. }) => Err(CourierError::CustomerMessage {
                customer: customer.log_id().to_string(),
                reason: e.to_string(),
            }),
            Err(e @ QueueError::Unavailable { .. }) => Err(CourierError::SegmentProcessing {
                segment: segment.label.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
