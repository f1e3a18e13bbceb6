use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_AGENT_ENDPOINT: &str = "localhost:6831";

/// Where gateway logs and spans go
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Fallback filter when `RUST_LOG` is not a valid directive
    pub log_level: String,
    /// Jaeger agent address; `None` disables span export
    pub jaeger_agent: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "gateway".to_string(),
            log_level: "info".to_string(),
            jaeger_agent: None,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// `ENABLE_JAEGER` switches export on; `JAEGER_ENDPOINT` overrides the agent address
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("ENABLE_JAEGER")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            service_name: service_name.to_string(),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            jaeger_agent: enabled.then(|| {
                lookup("JAEGER_ENDPOINT").unwrap_or_else(|| DEFAULT_AGENT_ENDPOINT.to_string())
            }),
        }
    }
}

/// Install the JSON log subscriber, plus a Jaeger layer when an agent is configured.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .json()
        .with_current_span(true);

    let otel_layer = match &config.jaeger_agent {
        Some(agent) => {
            let tracer = opentelemetry_jaeger::new_agent_pipeline()
                .with_service_name(&config.service_name)
                .with_endpoint(agent.as_str())
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        jaeger_agent = ?config.jaeger_agent,
        "Telemetry initialized"
    );
    Ok(())
}

/// Flush pending spans
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
