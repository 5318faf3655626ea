use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `PROMO_COURIER__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub queues: QueueRoutesConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub coupons: CouponConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_nats_max_reconnects")]
    pub max_reconnects: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Memory,
    Nats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
}

/// Destination queue (NATS subject) per segment. `general` is mandatory and
/// doubles as the fallback for every other segment.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueRoutesConfig {
    #[serde(default = "default_premium_queue")]
    pub premium: String,
    #[serde(default = "default_south_region_queue")]
    pub south_region: String,
    #[serde(default = "default_general_queue")]
    pub general: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_concurrent_segments")]
    pub max_concurrent_segments: usize,
    #[serde(default = "default_segment_timeout_ms")]
    pub segment_timeout_ms: u64,
    /// Reject unrecognized segment tags instead of treating them as `geral`.
    #[serde(default)]
    pub strict_segment_tags: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponConfig {
    #[serde(default = "default_max_redeem_attempts")]
    pub max_redeem_attempts: u32,
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: usize,
    #[serde(default)]
    pub seed_demo: bool,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_nats_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}
fn default_nats_max_reconnects() -> usize {
    60
}
fn default_redis_urls() -> Vec<String> {
    vec!["redis://localhost:6379".to_string()]
}
fn default_key_prefix() -> String {
    "promo".to_string()
}
fn default_premium_queue() -> String {
    "emails.premium".to_string()
}
fn default_south_region_queue() -> String {
    "emails.regiao_sul".to_string()
}
fn default_general_queue() -> String {
    "emails.geral".to_string()
}
fn default_max_concurrent_segments() -> usize {
    16
}
fn default_segment_timeout_ms() -> u64 {
    30_000
}
fn default_max_redeem_attempts() -> u32 {
    8
}
fn default_list_limit() -> usize {
    20
}
fn default_max_list_limit() -> usize {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: default_nats_urls(),
            max_reconnects: default_nats_max_reconnects(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            urls: default_redis_urls(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for QueueRoutesConfig {
    fn default() -> Self {
        Self {
            premium: default_premium_queue(),
            south_region: default_south_region_queue(),
            general: default_general_queue(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_segments: default_max_concurrent_segments(),
            segment_timeout_ms: default_segment_timeout_ms(),
            strict_segment_tags: false,
        }
    }
}

impl Default for CouponConfig {
    fn default() -> Self {
        Self {
            max_redeem_attempts: default_max_redeem_attempts(),
            default_list_limit: default_list_limit(),
            max_list_limit: default_max_list_limit(),
            seed_demo: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            nats: NatsConfig::default(),
            redis: RedisConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            queues: QueueRoutesConfig::default(),
            dispatch: DispatchConfig::default(),
            coupons: CouponConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment variables.
    /// Environment variables take precedence over the file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("PROMO_COURIER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("nats.urls")
                    .with_list_parse_key("redis.urls"),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.queue.backend, QueueBackend::Memory);
        assert_eq!(config.queues.general, "emails.geral");
        assert_eq!(config.dispatch.max_concurrent_segments, 16);
        assert!(!config.dispatch.strict_segment_tags);
        assert_eq!(config.coupons.default_list_limit, 20);
    }

    #[test]
    fn test_empty_sources_deserialize_to_defaults() {
        let config: AppConfig = config::Config::builder()
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("empty config should deserialize");
        assert_eq!(config.node_id, "node-01");
        assert_eq!(config.coupons.max_redeem_attempts, 8);
        assert_eq!(config.queues.premium, "emails.premium");
    }

    #[test]
    fn test_partial_queue_section_keeps_segment_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("queues.general", "q.geral")
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("partial queue config should deserialize");
        assert_eq!(config.queues.general, "q.geral");
        assert_eq!(config.queues.premium, "emails.premium");
        assert_eq!(config.queues.south_region, "emails.regiao_sul");
    }
}
