//! Tracing setup: env-filtered console output, plus OTLP span export when
//! an endpoint is configured.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Timeout for OTLP exports so an unreachable collector cannot stall shutdown
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

const SERVICE_NAME: &str = "pico-cdn";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,picocdn=debug,picostore=debug";

/// Handle returned by [`init`]; call [`Telemetry::shutdown`] before exit.
#[derive(Debug, Default)]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

/// Install the global subscriber.
///
/// `quiet` limits output to errors and ignores `RUST_LOG`.
pub fn init(otlp_endpoint: Option<&str>, quiet: bool) -> Result<Telemetry> {
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let provider = otlp_endpoint.map(tracer_provider).transpose()?;
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(endpoint) = otlp_endpoint {
        tracing::info!(endpoint, "exporting spans over OTLP");
    }

    Ok(Telemetry { provider })
}

fn tracer_provider(otlp_endpoint: &str) -> Result<SdkTracerProvider> {
    let resource = Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(normalize_endpoint(otlp_endpoint))
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP span exporter")?;

    let provider = SdkTracerProvider::builder()
        .with_span_processor(
            opentelemetry_sdk::trace::BatchSpanProcessor::builder(exporter).build(),
        )
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

impl Telemetry {
    /// Flush pending spans. A no-op without an exporter.
    pub fn shutdown(self) -> Result<()> {
        if let Some(provider) = self.provider {
            provider
                .shutdown()
                .map_err(|e| anyhow::anyhow!("OTLP shutdown failed: {e:?}"))?;
        }
        Ok(())
    }
}
