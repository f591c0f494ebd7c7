//! Process-wide tracing setup for a node.
//!
//! Logs are emitted as JSON lines. When an OTLP endpoint is configured,
//! spans are also exported in batches, tagged with the node's name so traces
//! from several nodes of one mesh can be told apart.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{BatchSpanProcessor, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource;
use tracing::warn;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::config::TelemetrySettings;

const NODE_NAME_KEY: &str = "weave.node.name";

/// Handle on the installed subscriber. Flushes pending spans on [`Telemetry::shutdown`].
#[derive(Debug)]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Installs the global subscriber for the node called `node_name`.
    ///
    /// # Errors
    /// Fails if the OTLP exporter cannot be built or a global subscriber is
    /// already installed.
    pub fn init(settings: &TelemetrySettings, node_name: &str) -> Result<Self> {
        let json = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed();
        let registry = Registry::default()
            .with(log_filter(&settings.log_level))
            .with(json);

        let Some(endpoint) = settings.otlp_endpoint.as_deref() else {
            registry.try_init().context("Failed to install subscriber")?;
            return Ok(Self { provider: None });
        };

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .context("Failed to build OTLP span exporter")?;
        let provider = SdkTracerProvider::builder()
            .with_span_processor(BatchSpanProcessor::builder(exporter).build())
            .with_resource(node_resource(&settings.service_name, node_name))
            .with_sampler(sampler(settings.sampling_ratio))
            .build();
        opentelemetry::global::set_tracer_provider(provider.clone());

        let tracer = provider.tracer(settings.service_name.clone());
        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .context("Failed to install subscriber")?;

        Ok(Self {
            provider: Some(provider),
        })
    }

    /// Flushes and stops the span exporter, if one was started.
    pub fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            warn!(error = %e, "Span exporter did not shut down cleanly");
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio.clamp(0.0, 1.0))))
}

fn node_resource(service_name: &str, node_name: &str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(resource::SERVICE_NAME, service_name.to_string()),
            KeyValue::new(resource::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new(NODE_NAME_KEY, node_name.to_string()),
        ])
        .build()
}
