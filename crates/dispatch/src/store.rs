//! Campaign metrics store. Holds one record per campaign, keyed by id.

use async_trait::async_trait;
use courier_core::config::RedisConfig;
use courier_core::types::CampaignRecord;
use courier_core::{CourierError, CourierResult};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert or replace the record for `record.campaign_id`.
    async fn put(&self, record: &CampaignRecord) -> CourierResult<()>;

    async fn get(&self, campaign_id: Uuid) -> CourierResult<Option<CampaignRecord>>;
}

// ─── In-memory ─────────────────────────────────────────────────────────────

/// DashMap-backed store for development and tests.
#[derive(Default)]
pub struct InMemoryCampaignStore {
    records: DashMap<Uuid, CampaignRecord>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        info!("Campaign store initialized (in-memory, development mode)");
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Make every subsequent `put` fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn put(&self, record: &CampaignRecord) -> CourierResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CourierError::Store("campaign store unavailable".to_string()));
        }
        self.records.insert(record.campaign_id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, campaign_id: Uuid) -> CourierResult<Option<CampaignRecord>> {
        Ok(self.records.get(&campaign_id).map(|r| r.value().clone()))
    }
}

// ─── Redis ─────────────────────────────────────────────────────────────────

/// Stores each record as a JSON string under `{prefix}:campaign:{id}`.
pub struct RedisCampaignStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisCampaignStore {
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting campaign store to Redis");

        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self::with_connection(conn, &config.key_prefix))
    }

    pub fn with_connection(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
        }
    }

    fn key(&self, campaign_id: Uuid) -> String {
        format!("{}:campaign:{campaign_id}", self.key_prefix)
    }
}

fn store_error(e: redis::RedisError) -> CourierError {
    CourierError::Store(e.to_string())
}

#[async_trait]
impl CampaignStore for RedisCampaignStore {
    async fn put(&self, record: &CampaignRecord) -> CourierResult<()> {
        let json = serde_json::to_string(record)?;
        let key = self.key(record.campaign_id);

        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&key, json).await.map_err(store_error)?;

        debug!(key = %key, status = ?record.status, "Campaign record written");
        Ok(())
    }

    async fn get(&self, campaign_id: Uuid) -> CourierResult<Option<CampaignRecord>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(self.key(campaign_id)).await.map_err(store_error)?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::types::{Campaign, CampaignStatus};

    fn record() -> CampaignRecord {
        CampaignRecord::started(&Campaign {
            id: Uuid::new_v4(),
            name: "X".into(),
            subject: "Y".into(),
            body: "Z".into(),
            segments: vec![],
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_put_replaces_record() {
        let store = InMemoryCampaignStore::new();
        let started = record();
        let id = started.campaign_id;

        store.put(&started).await.unwrap();
        store.put(&started.complete(vec![], Utc::now())).await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_writes() {
        let store = InMemoryCampaignStore::new();
        store.set_unavailable(true);
        let err = store.put(&record()).await.unwrap_err();
        assert!(matches!(err, CourierError::Store(_)));
        assert!(store.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryCampaignStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
