//! Request spans and subscriber/exporter setup.
//!
//! Spans are plain `tracing` spans. When an OTLP endpoint is configured the
//! subscriber gets a `tracing-opentelemetry` layer whose provider batches and
//! exports spans from its own worker; export errors are logged by the SDK and
//! never surface on the request path.

use std::fmt::Display;
use std::time::{Duration, Instant};

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing::field::Empty;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetrySection;

/// Span name shared by every request span; `otel.name` carries the specific one.
pub const REQUEST_SPAN: &str = "request";

/// Hands out request spans.
#[derive(Debug, Clone, Default)]
pub struct Tracer;

impl Tracer {
    pub fn start_span(&self, name: &'static str) -> SpanHandle {
        let span = tracing::info_span!(
            REQUEST_SPAN,
            otel.name = name,
            otel.status_code = Empty,
            outcome = Empty,
            error.message = Empty,
            latency_ms = Empty,
        );
        SpanHandle {
            span,
            started: Instant::now(),
        }
    }
}

/// An open request span.
///
/// `end` consumes the handle, so a span cannot be ended twice; a handle that
/// is dropped without `end` (early return, panic) still closes its span.
#[must_use = "a span handle should be ended with `end`"]
pub struct SpanHandle {
    span: Span,
    started: Instant,
}

impl SpanHandle {
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record the outcome of the traced operation.
    pub fn record_result<T, E: Display>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => {
                self.span.record("outcome", "ok");
                self.span.record("otel.status_code", "OK");
            }
            Err(e) => {
                self.span.record("outcome", "error");
                self.span.record("otel.status_code", "ERROR");
                self.span.record("error.message", e.to_string().as_str());
            }
        }
    }

    pub fn end(self) {
        self.span
            .record("latency_ms", self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Flushes and shuts down the span exporter on drop.
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = ?e, "tracer provider shutdown failed");
            }
        }
    }
}

/// Install the global subscriber: env filter + fmt, plus OTLP export when configured.
///
/// `RUST_LOG` takes precedence over `telemetry.log_level`.
pub fn init(cfg: &TelemetrySection) -> Result<TracingGuard, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.log_level))?;

    let provider = match &cfg.otlp_endpoint {
        Some(endpoint) => Some(build_provider(&cfg.service_name, endpoint)?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(cfg.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(otel_layer)
        .try_init()?;

    match &cfg.otlp_endpoint {
        Some(endpoint) => tracing::info!(service = %cfg.service_name, %endpoint, "OTLP tracing initialized"),
        None => tracing::debug!("no OTLP endpoint configured, spans stay local"),
    }

    Ok(TracingGuard { provider })
}

fn build_provider(
    service_name: &str,
    endpoint: &str,
) -> Result<SdkTracerProvider, Box<dyn std::error::Error + Send + Sync>> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10))
        .build()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build())
}
