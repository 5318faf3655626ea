//! Campaign REST endpoints.

use crate::rest::{error_response, ApiError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use courier_core::types::{CampaignRecord, CampaignRequest, CampaignSummary};
use courier_dispatch::CampaignDispatcher;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct CampaignState {
    pub dispatcher: Arc<CampaignDispatcher>,
}

/// POST /campanhas/trigger: validate and fan out a campaign.
pub async fn handle_trigger(
    State(state): State<CampaignState>,
    payload: Result<Json<CampaignRequest>, JsonRejection>,
) -> Result<Json<CampaignSummary>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Malformed campaign request");
        metrics::counter!("api.validation_errors").increment(1);
        error_response(StatusCode::BAD_REQUEST, "Corpo da requisição inválido")
    })?;

    match state.dispatcher.dispatch(request).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) if e.is_validation() => {
            warn!(error = %e, "Campaign request rejected");
            metrics::counter!("api.validation_errors").increment(1);
            Err(error_response(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            error!(error = %e, "Campaign dispatch failed");
            metrics::counter!("api.errors").increment(1);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao processar campanha",
            ))
        }
    }
}

/// GET /campanhas/:id: persisted campaign record.
pub async fn handle_get_campaign(
    State(state): State<CampaignState>,
    Path(campaign_id): Path<String>,
) -> Result<Json<CampaignRecord>, ApiError> {
    let not_found = || error_response(StatusCode::NOT_FOUND, "Campanha não encontrada");

    let Ok(id) = Uuid::parse_str(&campaign_id) else {
        return Err(not_found());
    };

    match state.dispatcher.campaign(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(campaign_id = %id, error = %e, "Campaign lookup failed");
            metrics::counter!("api.errors").increment(1);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao buscar campanha",
            ))
        }
    }
}
