//! Campaign fan-out: validates a campaign, splits it across customer segments,
//! personalizes one message per customer and hands it to the outbound queue.

#![warn(clippy::unwrap_used)]

pub mod dispatcher;
pub mod personalizer;
pub mod queue;
pub mod router;
pub mod segment;
pub mod store;

pub use dispatcher::CampaignDispatcher;
pub use personalizer::personalize;
pub use queue::{InMemoryQueue, NatsQueue, OutboundQueue, QueueError};
pub use router::QueueRouter;
pub use segment::SegmentProcessor;
pub use store::{CampaignStore, InMemoryCampaignStore, RedisCampaignStore};
