use std::collections::HashMap;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};
use tracing_tree::HierarchicalLayer;

const OTLP_TIMEOUT: Duration = Duration::from_secs(3);

/// Where and how to ship spans over OTLP/HTTP.
#[derive(Debug, Clone, PartialEq)]
pub struct OtlpConfig {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
}

impl OtlpConfig {
    /// Export is enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
    /// `HONEYCOMB_API_KEY`, if present, is sent as the team header.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|e| !e.is_empty())?;

        let mut headers = HashMap::new();
        if let Some(key) = lookup("HONEYCOMB_API_KEY") {
            headers.insert("x-honeycomb-team".to_string(), key);
        }

        Some(Self { endpoint, headers })
    }

    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Starts Sentry when `SENTRY_DSN` is set. Hold the guard for the life of
/// the process; dropping it flushes pending events.
pub fn setup_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;
    let traces_sample_rate = std::env::var("SENTRY_TRACES_SAMPLE_RATE")
        .ok()
        .and_then(|rate| rate.parse().ok())
        .unwrap_or(0.0);

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            traces_sample_rate,
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

/// Installs the global subscriber: `RUST_LOG` filtering (default
/// `info,<crate>=debug`), a hierarchical tree formatter on stderr, Sentry
/// breadcrumbs, and OTLP span export when configured.
///
/// Must run inside the tokio runtime, since the OTLP batch exporter spawns
/// onto it.
pub fn setup_tracing(crate_name: &str) -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("info,{crate_name}=debug")))?;

    let otel = match OtlpConfig::from_env() {
        Some(config) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .http()
                        .with_endpoint(config.endpoint)
                        .with_timeout(OTLP_TIMEOUT)
                        .with_headers(config.headers),
                )
                .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
                    opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                        "service.name",
                        crate_name.to_string(),
                    )]),
                ))
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true)
                .with_writer(std::io::stderr),
        )
        .with(otel)
        .with(sentry::integrations::tracing::layer())
        .try_init()?;

    Ok(())
}

/// Flushes any spans still queued for OTLP export.
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
