use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Gateway operations
    pub static ref OPERATION_COUNTER: CounterVec = register_counter_vec!(
        "gateway_operations_total",
        "Total number of gateway operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "gateway_operation_duration_seconds",
        "Gateway operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    // Cache
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "gateway_cache_requests_total",
        "Total number of cache lookups",
        &["cache_type", "status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_INVALIDATIONS: CounterVec = register_counter_vec!(
        "gateway_cache_invalidations_total",
        "Total number of cache deletions triggered by inventory events",
        &["mode"]
    )
    .expect("metric cannot be created");

    pub static ref COALESCED_WAITS: CounterVec = register_counter_vec!(
        "gateway_coalesced_waits_total",
        "Cache misses that awaited an in-flight fetch instead of calling the backend",
        &["cache_type"]
    )
    .expect("metric cannot be created");

    // Backend services
    pub static ref UPSTREAM_REQUESTS: CounterVec = register_counter_vec!(
        "gateway_upstream_requests_total",
        "Total number of backend service calls",
        &["service", "status"]
    )
    .expect("metric cannot be created");

    pub static ref UPSTREAM_DURATION: HistogramVec = register_histogram_vec!(
        "gateway_upstream_duration_seconds",
        "Backend service call duration in seconds",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");
}

/// Cache lookup outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Error,
}

impl CacheStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Error => "error",
        }
    }
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_operation(operation: &str, status: &str, duration_secs: f64) {
    OPERATION_COUNTER
        .with_label_values(&[operation, status])
        .inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_cache_request(cache_type: &str, status: CacheStatus) {
    CACHE_REQUESTS
        .with_label_values(&[cache_type, status.as_str()])
        .inc();
}

pub fn record_invalidation(mode: &str) {
    CACHE_INVALIDATIONS.with_label_values(&[mode]).inc();
}

pub fn record_coalesced_wait(cache_type: &str) {
    COALESCED_WAITS.with_label_values(&[cache_type]).inc();
}

pub fn record_upstream(service: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    UPSTREAM_REQUESTS
        .with_label_values(&[service, status])
        .inc();
    UPSTREAM_DURATION
        .with_label_values(&[service])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        record_operation("products", "success", 0.02);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("gateway_operations_total"));
    }

    #[test]
    fn test_record_cache_request() {
        record_cache_request("product", CacheStatus::Error);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("gateway_cache_requests_total"));
        assert!(metrics.contains("status=\"error\""));
    }

    #[test]
    fn test_record_upstream() {
        record_upstream("order-service", false, 0.3);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("gateway_upstream_requests_total"));
    }
}
