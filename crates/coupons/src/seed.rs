//! Demo coupons for development environments.

use crate::error::LedgerError;
use crate::ledger::CouponLedger;
use crate::model::{Coupon, CouponKind, CouponStatus};
use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

fn demo_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or_else(Utc::now)
}

#[allow(clippy::too_many_arguments)]
fn demo(
    id: &str,
    name: &str,
    description: &str,
    kind: CouponKind,
    value: f64,
    min_order_value: f64,
    status: CouponStatus,
    usage: (u32, u32),
    now: DateTime<Utc>,
) -> Coupon {
    Coupon {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        kind,
        value,
        min_order_value,
        status,
        usage_count: usage.0,
        usage_max: usage.1,
        created_at: now,
        expires_at: demo_expiry(),
    }
}

pub fn demo_coupons(now: DateTime<Utc>) -> Vec<Coupon> {
    vec![
        demo(
            "DESCONTO10",
            "Desconto 10%",
            "Desconto de 10% em todas as entregas",
            CouponKind::Percentage,
            10.0,
            50.0,
            CouponStatus::Available,
            (0, 100),
            now,
        ),
        demo(
            "FRETE_GRATIS",
            "Frete Grátis",
            "Frete grátis para pedidos acima de R$ 100",
            CouponKind::FreeShipping,
            0.0,
            100.0,
            CouponStatus::Available,
            (5, 200),
            now,
        ),
        demo(
            "DESCONTO25",
            "Super Desconto 25%",
            "Desconto especial de 25% para novos clientes",
            CouponKind::Percentage,
            25.0,
            200.0,
            CouponStatus::Available,
            (12, 50),
            now,
        ),
        demo(
            "ESGOTADO",
            "Cupom Esgotado",
            "Este cupom já foi totalmente utilizado",
            CouponKind::Percentage,
            15.0,
            75.0,
            CouponStatus::Exhausted,
            (10, 10),
            now,
        ),
    ]
}

/// Write the demo coupons through the ledger, replacing any existing
/// records with the same ids. Returns how many were written.
pub async fn seed_demo(ledger: &CouponLedger) -> Result<usize, LedgerError> {
    let coupons = demo_coupons(Utc::now());
    for coupon in &coupons {
        ledger.provision(coupon).await?;
    }
    info!(count = coupons.len(), "Demo coupons seeded");
    Ok(coupons.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryCouponStore;
    use courier_core::config::CouponConfig;
    use std::sync::Arc;

    #[test]
    fn test_demo_set_is_consistent() {
        let coupons = demo_coupons(Utc::now());
        assert_eq!(coupons.len(), 4);
        for c in &coupons {
            assert!(c.usage_count <= c.usage_max, "{}", c.id);
            assert_eq!(
                c.status == CouponStatus::Exhausted,
                c.usage_count >= c.usage_max,
                "{}",
                c.id
            );
        }
        assert_eq!(coupons[0].expires_at.to_rfc3339(), "2024-12-31T23:59:59+00:00");
    }

    #[tokio::test]
    async fn test_seeded_coupons_are_served() {
        let ledger = CouponLedger::new(&CouponConfig::default(), Arc::new(InMemoryCouponStore::new()));
        assert_eq!(seed_demo(&ledger).await.unwrap(), 4);

        let listed = ledger.list_available(None).await.unwrap();
        let codes: Vec<_> = listed.coupons.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["DESCONTO10", "DESCONTO25", "FRETE_GRATIS"]);

        let free = ledger.inspect("FRETE_GRATIS").await.unwrap();
        assert_eq!(free.discount, 0.0);
        assert_eq!(free.remaining_uses, 195);

        assert!(matches!(
            ledger.try_redeem("ESGOTADO").await.unwrap_err(),
            LedgerError::Exhausted { .. }
        ));
    }
}
