//! Coupon persistence with a status index and conditional usage updates.

use crate::error::StoreError;
use crate::model::{Coupon, CouponStatus};
use async_trait::async_trait;
use courier_core::config::RedisConfig;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// Usage count or status changed since `expected` was read.
    Conflict,
    Missing,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn get(&self, coupon_id: &str) -> Result<Option<Coupon>, StoreError>;

    /// Up to `limit` coupons currently in `status`, ordered by id.
    async fn list_by_status(&self, status: CouponStatus, limit: usize) -> Result<Vec<Coupon>, StoreError>;

    /// Replace the stored coupon with `next` only if its usage count and
    /// status still equal those of `expected`.
    async fn compare_and_set_usage(&self, expected: &Coupon, next: &Coupon) -> Result<CasOutcome, StoreError>;

    /// Insert or replace a coupon unconditionally. Provisioning only.
    async fn put(&self, coupon: &Coupon) -> Result<(), StoreError>;
}

// ─── In-memory ─────────────────────────────────────────────────────────────

/// DashMap-backed store. The CAS runs under the entry's shard lock.
#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: DashMap<String, Coupon>,
    forced_conflicts: AtomicU32,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        info!("Coupon store initialized (in-memory, development mode)");
        Self::default()
    }

    /// Make the next `count` CAS calls report a conflict without writing.
    pub fn force_conflicts(&self, count: u32) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn get(&self, coupon_id: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self.coupons.get(coupon_id).map(|c| c.value().clone()))
    }

    async fn list_by_status(&self, status: CouponStatus, limit: usize) -> Result<Vec<Coupon>, StoreError> {
        let mut matching: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn compare_and_set_usage(&self, expected: &Coupon, next: &Coupon) -> Result<CasOutcome, StoreError> {
        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(CasOutcome::Conflict);
        }

        let Some(mut stored) = self.coupons.get_mut(&expected.id) else {
            return Ok(CasOutcome::Missing);
        };
        if stored.usage_count != expected.usage_count || stored.status != expected.status {
            return Ok(CasOutcome::Conflict);
        }
        *stored = next.clone();
        Ok(CasOutcome::Applied)
    }

    async fn put(&self, coupon: &Coupon) -> Result<(), StoreError> {
        self.coupons.insert(coupon.id.clone(), coupon.clone());
        Ok(())
    }
}

// ─── Redis ─────────────────────────────────────────────────────────────────

/// Atomically checks `uso_atual`/`status`, writes the new record and moves
/// the id between status sets.
///
/// KEYS: coupon hash, old status set, new status set.
/// ARGV: expected usage, expected status, new usage, new status, record JSON, coupon id.
const CAS_SCRIPT: &str = r#"
local current = redis.call('HMGET', KEYS[1], 'uso_atual', 'status')
if not current[1] then
  return -1
end
if current[1] ~= ARGV[1] or current[2] ~= ARGV[2] then
  return 0
end
redis.call('HSET', KEYS[1], 'uso_atual', ARGV[3], 'status', ARGV[4], 'data', ARGV[5])
if ARGV[2] ~= ARGV[4] then
  redis.call('SREM', KEYS[2], ARGV[6])
  redis.call('SADD', KEYS[3], ARGV[6])
end
return 1
"#;

/// Each coupon is a hash at `{prefix}:coupon:{id}` holding `uso_atual`,
/// `status` and the full JSON record under `data`. Status sets at
/// `{prefix}:coupons:status:{status}` serve as the status index.
pub struct RedisCouponStore {
    conn: ConnectionManager,
    key_prefix: String,
    cas: redis::Script,
}

impl RedisCouponStore {
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting coupon store to Redis");

        let client = redis::Client::open(url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self::with_connection(conn, &config.key_prefix))
    }

    pub fn with_connection(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            cas: redis::Script::new(CAS_SCRIPT),
        }
    }

    fn coupon_key(&self, coupon_id: &str) -> String {
        coupon_key(&self.key_prefix, coupon_id)
    }

    fn status_key(&self, status: CouponStatus) -> String {
        status_key(&self.key_prefix, status)
    }
}

fn coupon_key(prefix: &str, coupon_id: &str) -> String {
    format!("{prefix}:coupon:{coupon_id}")
}

fn status_key(prefix: &str, status: CouponStatus) -> String {
    format!("{prefix}:coupons:status:{status}")
}

#[async_trait]
impl CouponStore for RedisCouponStore {
    async fn get(&self, coupon_id: &str) -> Result<Option<Coupon>, StoreError> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.hget(self.coupon_key(coupon_id), "data").await?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: CouponStatus, limit: usize) -> Result<Vec<Coupon>, StoreError> {
        let mut conn = self.conn.clone();
        let mut ids: Vec<String> = conn.smembers(self.status_key(status)).await?;
        ids.sort();
        ids.truncate(limit);

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hget(self.coupon_key(id), "data");
        }
        let records: Vec<Option<String>> = pipe.query_async(&mut conn).await?;

        let mut coupons = Vec::with_capacity(records.len());
        for json in records.into_iter().flatten() {
            let coupon: Coupon = serde_json::from_str(&json)?;
            // The set may lag a concurrent provisioning write.
            if coupon.status == status {
                coupons.push(coupon);
            }
        }
        Ok(coupons)
    }

    async fn compare_and_set_usage(&self, expected: &Coupon, next: &Coupon) -> Result<CasOutcome, StoreError> {
        let json = serde_json::to_string(next)?;
        let mut conn = self.conn.clone();

        let applied: i32 = self
            .cas
            .key(self.coupon_key(&expected.id))
            .key(self.status_key(expected.status))
            .key(self.status_key(next.status))
            .arg(expected.usage_count)
            .arg(expected.status.as_str())
            .arg(next.usage_count)
            .arg(next.status.as_str())
            .arg(json)
            .arg(&expected.id)
            .invoke_async(&mut conn)
            .await?;

        let outcome = match applied {
            1 => CasOutcome::Applied,
            0 => CasOutcome::Conflict,
            _ => CasOutcome::Missing,
        };
        debug!(coupon_id = %expected.id, outcome = ?outcome, "Coupon CAS");
        Ok(outcome)
    }

    async fn put(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let json = serde_json::to_string(coupon)?;
        let key = self.coupon_key(&coupon.id);

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset_multiple(
            &key,
            &[
                ("uso_atual", coupon.usage_count.to_string()),
                ("status", coupon.status.as_str().to_string()),
                ("data", json),
            ],
        )
        .ignore();
        for status in CouponStatus::ALL {
            if status != coupon.status {
                pipe.srem(self.status_key(status), &coupon.id).ignore();
            }
        }
        pipe.sadd(self.status_key(coupon.status), &coupon.id).ignore();

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!(key = %key, status = %coupon.status, "Coupon written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::CouponKind;
    use chrono::Utc;

    fn coupon(id: &str, status: CouponStatus, usage: u32, max: u32) -> Coupon {
        Coupon {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            kind: CouponKind::Percentage,
            value: 10.0,
            min_order_value: 0.0,
            status,
            usage_count: usage,
            usage_max: max,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cas_applies_when_unchanged() {
        let store = InMemoryCouponStore::new();
        let current = coupon("A", CouponStatus::Available, 1, 3);
        store.put(&current).await.unwrap();

        let outcome = store.compare_and_set_usage(&current, &current.redeemed()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Applied);
        assert_eq!(store.get("A").await.unwrap().unwrap().usage_count, 2);
    }

    #[tokio::test]
    async fn test_cas_conflicts_on_stale_read() {
        let store = InMemoryCouponStore::new();
        let stale = coupon("A", CouponStatus::Available, 1, 3);
        store.put(&stale.redeemed()).await.unwrap();

        let outcome = store.compare_and_set_usage(&stale, &stale.redeemed()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
        assert_eq!(store.get("A").await.unwrap().unwrap().usage_count, 2);
    }

    #[tokio::test]
    async fn test_cas_missing_and_forced_conflicts() {
        let store = InMemoryCouponStore::new();
        let ghost = coupon("GHOST", CouponStatus::Available, 0, 1);
        assert_eq!(
            store.compare_and_set_usage(&ghost, &ghost.redeemed()).await.unwrap(),
            CasOutcome::Missing
        );

        store.put(&ghost).await.unwrap();
        store.force_conflicts(1);
        assert_eq!(
            store.compare_and_set_usage(&ghost, &ghost.redeemed()).await.unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(
            store.compare_and_set_usage(&ghost, &ghost.redeemed()).await.unwrap(),
            CasOutcome::Applied
        );
    }

    #[tokio::test]
    async fn test_list_by_status_filters_orders_and_limits() {
        let store = InMemoryCouponStore::new();
        store.put(&coupon("C", CouponStatus::Available, 0, 5)).await.unwrap();
        store.put(&coupon("A", CouponStatus::Available, 0, 5)).await.unwrap();
        store.put(&coupon("B", CouponStatus::Exhausted, 5, 5)).await.unwrap();
        store.put(&coupon("D", CouponStatus::Available, 0, 5)).await.unwrap();

        let ids: Vec<_> = store
            .list_by_status(CouponStatus::Available, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["A", "C"]);
    }

    #[test]
    fn test_redis_key_layout() {
        assert_eq!(coupon_key("promo", "DESCONTO10"), "promo:coupon:DESCONTO10");
        assert_eq!(
            status_key("promo", CouponStatus::Available),
            "promo:coupons:status:disponivel"
        );
    }
}
