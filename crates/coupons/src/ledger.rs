//! Coupon ledger: redemption with compare-and-set and bounded retry,
//! read-only inspection and listing of available coupons.

use crate::error::LedgerError;
use crate::model::{AvailableCoupons, Coupon, CouponListing, CouponStatus, CouponView};
use crate::store::{CasOutcome, CouponStore};
use chrono::Utc;
use courier_core::config::CouponConfig;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct CouponLedger {
    store: Arc<dyn CouponStore>,
    max_attempts: u32,
    default_list_limit: usize,
    max_list_limit: usize,
}

impl CouponLedger {
    pub fn new(config: &CouponConfig, store: Arc<dyn CouponStore>) -> Self {
        info!(
            max_redeem_attempts = config.max_redeem_attempts,
            default_list_limit = config.default_list_limit,
            max_list_limit = config.max_list_limit,
            "Coupon ledger initialized"
        );
        Self {
            store,
            max_attempts: config.max_redeem_attempts.max(1),
            default_list_limit: config.default_list_limit,
            max_list_limit: config.max_list_limit,
        }
    }

    /// Redeem one use of `coupon_id`.
    ///
    /// Succeeds at most `uso_maximo - uso_atual` times across all concurrent
    /// callers. A lost CAS race re-reads and retries up to the configured
    /// attempt budget; once spent, the coupon is re-read and the call fails
    /// with whatever its current state warrants.
    pub async fn try_redeem(&self, coupon_id: &str) -> Result<CouponView, LedgerError> {
        let outcome = self.redeem(coupon_id).await;
        match &outcome {
            Ok(view) => {
                metrics::counter!("coupons.redeemed").increment(1);
                info!(
                    coupon_id = %coupon_id,
                    remaining_uses = view.remaining_uses,
                    status = %view.status,
                    "Coupon redeemed"
                );
            }
            Err(LedgerError::Store(e)) => {
                error!(coupon_id = %coupon_id, error = %e, "Coupon store failure");
            }
            Err(e) => {
                metrics::counter!("coupons.redeem_rejected", "reason" => e.kind()).increment(1);
                warn!(coupon_id = %coupon_id, reason = e.kind(), "Coupon redemption rejected");
            }
        }
        outcome
    }

    async fn redeem(&self, coupon_id: &str) -> Result<CouponView, LedgerError> {
        for attempt in 1..=self.max_attempts {
            let current = self.load(coupon_id).await?;
            check_redeemable(&current)?;

            let next = current.redeemed();
            match self.store.compare_and_set_usage(&current, &next).await? {
                CasOutcome::Applied => return Ok(CouponView::from(&next)),
                CasOutcome::Missing => {
                    return Err(LedgerError::NotFound {
                        coupon_id: coupon_id.to_string(),
                    })
                }
                CasOutcome::Conflict => {
                    metrics::counter!("coupons.redeem_conflicts").increment(1);
                    debug!(coupon_id = %coupon_id, attempt, "Coupon CAS conflict, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(
            coupon_id = %coupon_id,
            attempts = self.max_attempts,
            "Coupon redemption retry budget spent"
        );
        let current = self.load(coupon_id).await?;
        check_redeemable(&current)?;
        Err(LedgerError::Unavailable {
            coupon_id: coupon_id.to_string(),
        })
    }

    /// Current view of a coupon without redeeming it.
    pub async fn inspect(&self, coupon_id: &str) -> Result<CouponView, LedgerError> {
        let coupon = self.load(coupon_id).await?;
        debug!(coupon_id = %coupon_id, "Coupon inspected");
        Ok(CouponView::from(&coupon))
    }

    /// Coupons in `disponivel`. `limit` defaults to the configured default
    /// and is capped at the configured maximum.
    pub async fn list_available(&self, limit: Option<usize>) -> Result<AvailableCoupons, LedgerError> {
        let limit = limit
            .unwrap_or(self.default_list_limit)
            .min(self.max_list_limit);

        let coupons: Vec<CouponListing> = self
            .store
            .list_by_status(CouponStatus::Available, limit)
            .await?
            .iter()
            .map(|c| CouponListing {
                code: c.id.clone(),
                discount: c.discount(),
            })
            .collect();

        info!(count = coupons.len(), limit, "Listed available coupons");

        Ok(AvailableCoupons {
            total: coupons.len(),
            coupons,
            timestamp: Utc::now(),
        })
    }

    /// Insert or replace a coupon record.
    pub async fn provision(&self, coupon: &Coupon) -> Result<(), LedgerError> {
        self.store.put(coupon).await?;
        info!(coupon_id = %coupon.id, status = %coupon.status, "Coupon provisioned");
        Ok(())
    }

    async fn load(&self, coupon_id: &str) -> Result<Coupon, LedgerError> {
        self.store
            .get(coupon_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                coupon_id: coupon_id.to_string(),
            })
    }
}

fn check_redeemable(coupon: &Coupon) -> Result<(), LedgerError> {
    match coupon.status {
        CouponStatus::Exhausted => Err(LedgerError::Exhausted {
            coupon_id: coupon.id.clone(),
        }),
        CouponStatus::Inactive => Err(LedgerError::Unavailable {
            coupon_id: coupon.id.clone(),
        }),
        CouponStatus::Available if coupon.usage_count >= coupon.usage_max => {
            Err(LedgerError::Exhausted {
                coupon_id: coupon.id.clone(),
            })
        }
        CouponStatus::Available => Ok(()),
    }
}
