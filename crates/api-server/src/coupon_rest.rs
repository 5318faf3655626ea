//! Coupon REST endpoints.

use crate::rest::{error_response, ApiError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_coupons::{AvailableCoupons, CouponLedger, CouponView, LedgerError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct CouponState {
    pub ledger: Arc<CouponLedger>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CouponParams {
    pub usar: Option<String>,
}

impl CouponParams {
    /// Redeem unless `usar` is present and not `true` (any case).
    pub fn redeem(&self) -> bool {
        self.usar
            .as_deref()
            .map_or(true, |v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// GET /cupons?limit=N: available coupons.
pub async fn handle_list(
    State(state): State<CouponState>,
    Query(params): Query<ListParams>,
) -> Result<Json<AvailableCoupons>, ApiError> {
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) => Some(limit),
            Err(_) => {
                metrics::counter!("api.validation_errors").increment(1);
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    "Parâmetro limit inválido",
                ));
            }
        },
    };

    state.ledger.list_available(limit).await.map(Json).map_err(|e| {
        error!(error = %e, "Coupon listing failed");
        metrics::counter!("api.errors").increment(1);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Erro ao buscar cupons")
    })
}

/// GET /cupons/:id?usar=true|false: redeem (default) or inspect a coupon.
pub async fn handle_coupon(
    State(state): State<CouponState>,
    Path(coupon_id): Path<String>,
    Query(params): Query<CouponParams>,
) -> Result<Json<CouponView>, ApiError> {
    let outcome = if params.redeem() {
        state.ledger.try_redeem(&coupon_id).await
    } else {
        state.ledger.inspect(&coupon_id).await
    };

    outcome.map(Json).map_err(ledger_error)
}

fn ledger_error(e: LedgerError) -> ApiError {
    match e {
        LedgerError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, e.to_string()),
        LedgerError::Unavailable { .. } | LedgerError::Exhausted { .. } => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        LedgerError::Store(_) => {
            metrics::counter!("api.errors").increment(1);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Erro ao buscar cupom")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(usar: Option<&str>) -> CouponParams {
        CouponParams {
            usar: usar.map(String::from),
        }
    }

    #[test]
    fn test_usar_defaults_to_redeem() {
        assert!(params(None).redeem());
        assert!(params(Some("true")).redeem());
        assert!(params(Some("TRUE")).redeem());
        assert!(!params(Some("false")).redeem());
        assert!(!params(Some("1")).redeem());
        assert!(!params(Some("")).redeem());
    }
}
