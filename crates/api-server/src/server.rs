//! HTTP server and metrics exporter.

use crate::campaign_rest::{self, CampaignState};
use crate::coupon_rest::{self, CouponState};
use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use courier_core::config::AppConfig;
use courier_coupons::CouponLedger;
use courier_dispatch::CampaignDispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Full application router with middleware. Unknown routes answer 404.
pub fn router(node_id: &str, dispatcher: Arc<CampaignDispatcher>, ledger: Arc<CouponLedger>) -> Router {
    let ops = Router::new()
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(AppState {
            node_id: node_id.to_string(),
            start_time: Instant::now(),
        });

    let campaigns = Router::new()
        .route("/campanhas/trigger", post(campaign_rest::handle_trigger))
        .route("/campanhas/:id", get(campaign_rest::handle_get_campaign))
        .with_state(CampaignState { dispatcher });

    let coupons = Router::new()
        .route("/cupons", get(coupon_rest::handle_list))
        .route("/cupons/:id", get(coupon_rest::handle_coupon))
        .with_state(CouponState { ledger });

    ops.merge(campaigns)
        .merge(coupons)
        .fallback(rest::not_found)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    config: AppConfig,
    dispatcher: Arc<CampaignDispatcher>,
    ledger: Arc<CouponLedger>,
}

impl ApiServer {
    pub fn new(config: AppConfig, dispatcher: Arc<CampaignDispatcher>, ledger: Arc<CouponLedger>) -> Self {
        Self {
            config,
            dispatcher,
            ledger,
        }
    }

    /// Serve HTTP until Ctrl-C or SIGTERM, then drain in-flight requests.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(&self.config.node_id, self.dispatcher.clone(), self.ledger.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Install the Prometheus recorder and its scrape listener.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
