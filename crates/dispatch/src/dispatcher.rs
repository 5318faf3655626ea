//! Campaign dispatcher: validates a trigger request, records the campaign,
//! fans segments out over a bounded set of tasks and aggregates the results.

use crate::segment::SegmentProcessor;
use crate::store::CampaignStore;
use chrono::Utc;
use courier_core::config::DispatchConfig;
use courier_core::types::{
    Campaign, CampaignRecord, CampaignRequest, CampaignSummary, Segment, SegmentResult, SegmentTag,
};
use courier_core::{CourierError, CourierResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct CampaignDispatcher {
    run: CampaignRun,
    strict_segment_tags: bool,
}

/// Everything a campaign needs after validation. Owned, so a run can be
/// moved onto its own task.
#[derive(Clone)]
struct CampaignRun {
    processor: Arc<SegmentProcessor>,
    store: Arc<dyn CampaignStore>,
    max_concurrent_segments: usize,
    segment_timeout: Duration,
}

impl CampaignDispatcher {
    pub fn new(
        config: &DispatchConfig,
        processor: Arc<SegmentProcessor>,
        store: Arc<dyn CampaignStore>,
    ) -> Self {
        info!(
            max_concurrent_segments = config.max_concurrent_segments,
            segment_timeout_ms = config.segment_timeout_ms,
            strict_segment_tags = config.strict_segment_tags,
            "Campaign dispatcher initialized"
        );
        Self {
            run: CampaignRun {
                processor,
                store,
                max_concurrent_segments: config.max_concurrent_segments.max(1),
                segment_timeout: Duration::from_millis(config.segment_timeout_ms),
            },
            strict_segment_tags: config.strict_segment_tags,
        }
    }

    /// Check the request and turn it into an accepted campaign with a fresh id.
    pub fn validate(&self, request: CampaignRequest) -> CourierResult<Campaign> {
        let name = required(request.name, "nome")?;
        let subject = required(request.subject, "assunto")?;
        let body = required(request.body, "conteudo")?;

        let specs = match request.segments {
            Some(specs) if !specs.is_empty() => specs,
            _ => return Err(CourierError::missing_field("grupos")),
        };

        let has_tag = specs
            .iter()
            .any(|s| s.tag.as_deref().is_some_and(|t| !t.trim().is_empty()));
        if !has_tag {
            return Err(CourierError::missing_field("grupos.tipo"));
        }

        let mut segments = Vec::with_capacity(specs.len());
        for spec in specs {
            let label = match spec.tag.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => raw.to_string(),
                _ => SegmentTag::General.as_str().to_string(),
            };
            let tag = match SegmentTag::parse(&label) {
                Some(tag) => tag,
                None if self.strict_segment_tags => {
                    return Err(CourierError::Validation(format!(
                        "Valor inválido em grupos.tipo: {label}"
                    )))
                }
                None => SegmentTag::General,
            };
            segments.push(Segment {
                label,
                tag,
                customers: spec.customers,
            });
        }

        Ok(Campaign {
            id: Uuid::new_v4(),
            name,
            subject,
            body,
            segments,
            created_at: Utc::now(),
        })
    }

    /// Validate, persist the start record, fan out and persist the terminal
    /// record. Only validation and the first store write can fail the call.
    ///
    /// Everything after validation runs on a detached task: dropping the
    /// returned future does not stop the campaign, and the terminal record
    /// is still written.
    pub async fn dispatch(&self, request: CampaignRequest) -> CourierResult<CampaignSummary> {
        let campaign = self.validate(request)?;
        let campaign_id = campaign.id;

        match tokio::spawn(self.run.clone().execute(campaign)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(campaign_id = %campaign_id, error = %e, "Campaign task aborted");
                Err(CourierError::Internal(anyhow::anyhow!(
                    "campaign task aborted: {e}"
                )))
            }
        }
    }

    /// Look up a persisted campaign record.
    pub async fn campaign(&self, campaign_id: Uuid) -> CourierResult<Option<CampaignRecord>> {
        self.run.store.get(campaign_id).await
    }
}

impl CampaignRun {
    async fn execute(self, campaign: Campaign) -> CourierResult<CampaignSummary> {
        let started = CampaignRecord::started(&campaign);
        if let Err(e) = self.store.put(&started).await {
            error!(campaign_id = %campaign.id, error = %e, "Failed to record campaign start");
            return Err(CourierError::Internal(anyhow::anyhow!(
                "campaign start not recorded: {e}"
            )));
        }

        info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            segments = campaign.segments.len(),
            "Campaign started"
        );

        let campaign = Arc::new(campaign);
        let results = self.fan_out(campaign.clone()).await;

        let record = started.complete(results, Utc::now());
        if let Err(e) = self.store.put(&record).await {
            error!(campaign_id = %campaign.id, error = %e, "Failed to record campaign completion");
            metrics::counter!("dispatch.record_failures").increment(1);
        }

        metrics::counter!("dispatch.campaigns").increment(1);
        info!(
            campaign_id = %campaign.id,
            messages_enqueued = record.messages_enqueued,
            "Campaign completed"
        );

        Ok(CampaignSummary::from(&record))
    }

    /// Run every segment on its own task, at most `max_concurrent_segments`
    /// at a time. Returns one result per segment, in request order.
    async fn fan_out(&self, campaign: Arc<Campaign>) -> Vec<SegmentResult> {
        let permits = self.max_concurrent_segments.min(campaign.segments.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let handles: Vec<_> = (0..campaign.segments.len())
            .map(|index| {
                let campaign = campaign.clone();
                let processor = self.processor.clone();
                let semaphore = semaphore.clone();
                let timeout = self.segment_timeout;

                tokio::spawn(async move {
                    let segment = &campaign.segments[index];
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return Err(CourierError::Internal(e.into())),
                    };

                    let started = Instant::now();
                    let outcome =
                        tokio::time::timeout(timeout, processor.process(&campaign, segment)).await;
                    metrics::histogram!("dispatch.segment_latency_ms")
                        .record(started.elapsed().as_millis() as f64);

                    outcome.unwrap_or_else(|_| {
                        Err(CourierError::SegmentProcessing {
                            segment: segment.label.clone(),
                            reason: format!("timed out after {}ms", timeout.as_millis()),
                        })
                    })
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (segment, handle) in campaign.segments.iter().zip(handles) {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(campaign_id = %campaign.id, segment = %segment.label, error = %e, "Segment failed");
                    metrics::counter!("dispatch.segment_failures").increment(1);
                    SegmentResult::failed(segment, e.to_string())
                }
                Err(e) => {
                    warn!(campaign_id = %campaign.id, segment = %segment.label, error = %e, "Segment task aborted");
                    metrics::counter!("dispatch.segment_failures").increment(1);
                    SegmentResult::failed(segment, format!("segment task aborted: {e}"))
                }
            };
            results.push(result);
        }

        results
    }
}

fn required(value: Option<String>, field: &str) -> CourierResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CourierError::missing_field(field)),
    }
}
