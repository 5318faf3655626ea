//! Promo Courier: segmented campaign dispatch and coupon redemption service.
//!
//! Main entry point that wires the configured backends and starts the server.

use clap::Parser;
use courier_api::ApiServer;
use courier_core::config::{AppConfig, QueueBackend, StorageBackend};
use courier_coupons::seed::seed_demo;
use courier_coupons::{CouponLedger, CouponStore, InMemoryCouponStore, RedisCouponStore};
use courier_dispatch::{
    CampaignDispatcher, CampaignStore, InMemoryCampaignStore, InMemoryQueue, NatsQueue, OutboundQueue,
    QueueRouter, RedisCampaignStore, SegmentProcessor,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "promo-courier")]
#[command(about = "Segmented campaign dispatch and coupon redemption service")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "PROMO_COURIER_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "PROMO_COURIER__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "PROMO_COURIER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Provision the demo coupons on startup
    #[arg(long, default_value_t = false)]
    seed_coupons: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "promo_courier=info,courier_api=info,courier_dispatch=info,courier_coupons=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Promo Courier starting up");

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            error!(error = %e, "Failed to load config file");
            return Err(e.into());
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.seed_coupons {
        config.coupons.seed_demo = true;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        storage = ?config.storage.backend,
        queue = ?config.queue.backend,
        "Configuration loaded"
    );

    let router = QueueRouter::from_config(&config.queues)?;

    let queue: Arc<dyn OutboundQueue> = match config.queue.backend {
        QueueBackend::Nats => Arc::new(NatsQueue::connect(&config.nats).await.map_err(|e| {
            error!(error = %e, "Failed to connect to NATS");
            e
        })?),
        QueueBackend::Memory => {
            warn!("Outbound queue is in-memory, messages are not delivered (development mode)");
            Arc::new(InMemoryQueue::new())
        }
    };

    let (campaign_store, coupon_store): (Arc<dyn CampaignStore>, Arc<dyn CouponStore>) =
        match config.storage.backend {
            StorageBackend::Redis => {
                let campaigns = RedisCampaignStore::new(&config.redis).await.map_err(|e| {
                    error!(error = %e, "Failed to connect campaign store to Redis");
                    e
                })?;
                let coupons = RedisCouponStore::new(&config.redis).await.map_err(|e| {
                    error!(error = %e, "Failed to connect coupon store to Redis");
                    e
                })?;
                (Arc::new(campaigns) as Arc<dyn CampaignStore>, Arc::new(coupons) as Arc<dyn CouponStore>)
            }
            StorageBackend::Memory => (
                Arc::new(InMemoryCampaignStore::new()) as Arc<dyn CampaignStore>,
                Arc::new(InMemoryCouponStore::new()) as Arc<dyn CouponStore>,
            ),
        };

    let processor = Arc::new(SegmentProcessor::new(router, queue));
    let dispatcher = Arc::new(CampaignDispatcher::new(
        &config.dispatch,
        processor,
        campaign_store,
    ));
    let ledger = Arc::new(CouponLedger::new(&config.coupons, coupon_store));

    if config.coupons.seed_demo {
        seed_demo(&ledger).await?;
    }

    let api_server = ApiServer::new(config.clone(), dispatcher, ledger);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Promo Courier is ready to serve traffic");

    api_server.start_http().await?;

    info!("Promo Courier stopped");
    Ok(())
}
