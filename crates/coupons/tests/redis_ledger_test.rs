//! Coupon ledger against a live Redis.
//! Requires: Redis running locally, or at REDIS_URL (run with --ignored).

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use courier_core::config::{CouponConfig, RedisConfig};
    use courier_coupons::{
        CasOutcome, Coupon, CouponKind, CouponLedger, CouponStatus, CouponStore, LedgerError,
        RedisCouponStore,
    };
    use std::sync::Arc;

    async fn redis_store() -> Arc<RedisCouponStore> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let config = RedisConfig {
            urls: vec![url],
            key_prefix: format!("promo-test-{}", Utc::now().timestamp_nanos_opt().unwrap()),
        };
        Arc::new(RedisCouponStore::new(&config).await.unwrap())
    }

    fn coupon(id: &str, usage: u32, max: u32) -> Coupon {
        Coupon {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            kind: CouponKind::Percentage,
            value: 15.0,
            min_order_value: 50.0,
            status: CouponStatus::Available,
            usage_count: usage,
            usage_max: max,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_cas_detects_stale_and_missing() {
        let store = redis_store().await;
        let original = coupon("CAS", 1, 5);
        store.put(&original).await.unwrap();

        let next = original.redeemed();
        assert_eq!(
            store.compare_and_set_usage(&original, &next).await.unwrap(),
            CasOutcome::Applied
        );
        assert_eq!(
            store.compare_and_set_usage(&original, &next).await.unwrap(),
            CasOutcome::Conflict
        );

        let ghost = coupon("GHOST", 0, 5);
        assert_eq!(
            store
                .compare_and_set_usage(&ghost, &ghost.redeemed())
                .await
                .unwrap(),
            CasOutcome::Missing
        );

        let stored = store.get("CAS").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires Redis"]
    async fn test_redis_concurrent_redemptions_stop_at_maximum() {
        let store = redis_store().await;
        let ledger = Arc::new(CouponLedger::new(&CouponConfig::default(), store.clone()));
        ledger.provision(&coupon("HOT", 3, 10)).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_redeem("HOT").await })
            })
            .collect();

        let mut successes = 0u32;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(LedgerError::Exhausted { .. } | LedgerError::Unavailable { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let stored = store.get("HOT").await.unwrap().unwrap();
        assert_eq!(successes, 7);
        assert_eq!(stored.usage_count, 10);
        assert_eq!(stored.status, CouponStatus::Exhausted);

        let available = ledger.list_available(None).await.unwrap();
        assert_eq!(available.total, 0);
        let exhausted = store
            .list_by_status(CouponStatus::Exhausted, 10)
            .await
            .unwrap();
        assert_eq!(exhausted.len(), 1);
    }
}
