//! Trace Export
//!
//! Structured logs always go to stdout through `tracing`; when export is
//! enabled, spans are additionally shipped to an OTLP collector. Traces are
//! attributed to the registered service unless `OTEL_SERVICE_NAME` pins a
//! name explicitly.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: set to "false" to skip the export layer (default: `true`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector address
//!   (default: `http://localhost:4318`)
//! - `OTEL_SERVICE_NAME`: fixed trace attribution, overriding the registered
//!   service name (default: unset)
//!
//! # Usage
//!
//! ```ignore
//! use serve_host::init_telemetry;
//!
//! // Keep the guard alive; dropping it flushes and shuts down the exporter.
//! let _guard = init_telemetry();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Fallback service name when neither the environment nor a registration
/// supplies one.
const DEFAULT_SERVICE_NAME: &str = "serve-host";

/// Default OTLP collector endpoint.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Log levels applied on top of `RUST_LOG`.
const BASE_DIRECTIVES: [&str; 4] = ["serve_host=info", "tower=warn", "h2=warn", "hyper=warn"];

// =============================================================================
// Configuration
// =============================================================================

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether the OTLP export layer is installed.
    pub enabled: bool,
    /// OTLP collector endpoint.
    pub otlp_endpoint: String,
    /// Service name traces are attributed to.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the environment, falling back to the defaults
    /// above.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("OTEL_ENABLED").map_or(true, |v| v.to_lowercase() != "false"),
            otlp_endpoint: env_or("OTEL_EXPORTER_OTLP_ENDPOINT", DEFAULT_OTLP_ENDPOINT),
            service_name: env_or("OTEL_SERVICE_NAME", DEFAULT_SERVICE_NAME),
        }
    }

    /// Whether `OTEL_SERVICE_NAME` was set explicitly.
    ///
    /// When it was not, the bootstrap attributes traces to the registered
    /// service instead of the host fallback.
    #[must_use]
    pub fn service_name_overridden() -> bool {
        std::env::var("OTEL_SERVICE_NAME").is_ok()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

// =============================================================================
// Initialization
// =============================================================================

/// Keeps the export pipeline alive; dropping it flushes and shuts the
/// exporter down.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {e}");
        }
    }
}

/// Initialize telemetry from the environment.
///
/// The returned guard must be held for the life of the process; dropping it
/// flushes pending spans and shuts the exporter down.
#[must_use]
pub fn init() -> TelemetryGuard {
    init_with_config(TelemetryConfig::from_env())
}

/// Initialize telemetry with an explicit configuration.
///
/// The fmt layer is always installed; the export layer only when
/// `config.enabled` holds.
#[must_use]
pub fn init_with_config(config: TelemetryConfig) -> TelemetryGuard {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let tracer_provider = config.enabled.then(|| otlp_tracer_provider(&config));
    let export_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(base_filter())
        .with(fmt_layer)
        .with(export_layer)
        .init();

    TelemetryGuard { tracer_provider }
}

/// Build a batch-exporting tracer provider aimed at the configured collector.
#[allow(clippy::expect_used)]
fn otlp_tracer_provider(config: &TelemetryConfig) -> SdkTracerProvider {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .expect("OTLP exporter construction failed");

    SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build()
}

/// `RUST_LOG` plus the base directives, least specific first.
#[allow(clippy::expect_used)]
fn base_filter() -> EnvFilter {
    BASE_DIRECTIVES
        .iter()
        .fold(EnvFilter::from_default_env(), |filter, directive| {
            filter.add_directive(
                directive
                    .parse()
                    .expect("base directives are static and valid"),
            )
        })
}

// =============================================================================
// Tests
// =============================================================================
