use std::str::FromStr;
use std::time::Duration;

/// How inventory events are turned into cache deletions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationMode {
    /// Every message deletes the product listing key only
    Coarse,
    /// Also deletes the per-id key when the payload names a product
    PerProduct,
}

impl FromStr for InvalidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => Ok(InvalidationMode::Coarse),
            "per-product" | "per_product" => Ok(InvalidationMode::PerProduct),
            other => Err(format!("unknown invalidation mode: {}", other)),
        }
    }
}

impl InvalidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationMode::Coarse => "coarse",
            InvalidationMode::PerProduct => "per-product",
        }
    }
}

/// Base URLs of the three backend services
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub user_service_url: String,
    pub product_service_url: String,
    pub order_service_url: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            user_service_url: "http://localhost:3001".to_string(),
            product_service_url: "http://localhost:3002".to_string(),
            order_service_url: "http://localhost:3003".to_string(),
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Kafka consumer settings for the invalidation topic
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub consumer_group: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "inventory-events".to_string(),
            consumer_group: "gateway".to_string(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub redis_url: String,
    pub backends: BackendConfig,
    pub kafka: KafkaConfig,
    pub jwt_secret: Option<String>,
    pub product_api_key: Option<String>,
    pub coalesce_misses: bool,
    pub invalidation_mode: InvalidationMode,
    pub invalidator_max_retries: u32,
    /// Upper bound on every cache round-trip; an expired call counts as the cache being down
    pub cache_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            redis_url: "redis://localhost:6379".to_string(),
            backends: BackendConfig::default(),
            kafka: KafkaConfig::default(),
            jwt_secret: None,
            product_api_key: None,
            coalesce_misses: false,
            invalidation_mode: InvalidationMode::Coarse,
            invalidator_max_retries: 0,
            cache_timeout: Duration::from_millis(250),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment (and `.env` if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let secret = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let timeout_ms = lookup("UPSTREAM_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.backends.timeout.as_millis() as u64);

        let cache_timeout_ms = lookup("CACHE_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.cache_timeout.as_millis() as u64);

        Self {
            port: parse_or(lookup("PORT"), defaults.port),
            redis_url: string("REDIS_URL", defaults.redis_url),
            backends: BackendConfig {
                user_service_url: string("USER_SERVICE_URL", defaults.backends.user_service_url),
                product_service_url: string(
                    "PRODUCT_SERVICE_URL",
                    defaults.backends.product_service_url,
                ),
                order_service_url: string("ORDER_SERVICE_URL", defaults.backends.order_service_url),
                timeout: Duration::from_millis(timeout_ms),
            },
            kafka: KafkaConfig {
                brokers: string("KAFKA_BROKERS", defaults.kafka.brokers),
                topic: string("KAFKA_TOPIC", defaults.kafka.topic),
                consumer_group: string("CONSUMER_GROUP", defaults.kafka.consumer_group),
            },
            jwt_secret: secret("JWT_SECRET"),
            product_api_key: secret("PRODUCT_SERVICE_API_KEY"),
            coalesce_misses: parse_or(lookup("CACHE_COALESCE_MISSES"), defaults.coalesce_misses),
            invalidation_mode: parse_or(lookup("INVALIDATION_MODE"), defaults.invalidation_mode),
            invalidator_max_retries: parse_or(
                lookup("INVALIDATOR_MAX_RETRIES"),
                defaults.invalidator_max_retries,
            ),
            cache_timeout: Duration::from_millis(cache_timeout_ms),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
