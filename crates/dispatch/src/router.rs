//! Segment → outbound queue routing.

use courier_core::config::QueueRoutesConfig;
use courier_core::types::SegmentTag;
use courier_core::{CourierError, CourierResult};
use tracing::info;

/// Resolves the destination queue for a segment. Built once at startup;
/// construction fails when no general queue is configured.
#[derive(Debug, Clone)]
pub struct QueueRouter {
    premium: String,
    south_region: String,
    general: String,
}

impl QueueRouter {
    pub fn from_config(config: &QueueRoutesConfig) -> CourierResult<Self> {
        let general = config.general.trim();
        if general.is_empty() {
            return Err(CourierError::Config(
                "queues.general must name the default outbound queue".to_string(),
            ));
        }

        let or_general = |queue: &str| {
            let queue = queue.trim();
            if queue.is_empty() {
                general.to_string()
            } else {
                queue.to_string()
            }
        };

        let router = Self {
            premium: or_general(&config.premium),
            south_region: or_general(&config.south_region),
            general: general.to_string(),
        };

        info!(
            premium = %router.premium,
            south_region = %router.south_region,
            general = %router.general,
            "Queue routes configured"
        );

        Ok(router)
    }

    pub fn route(&self, tag: SegmentTag) -> &str {
        match tag {
            SegmentTag::Premium => &self.premium,
            SegmentTag::SouthRegion => &self.south_region,
            SegmentTag::General => &self.general,
        }
    }
}
