//! Telemetry sink: metrics registry plus request tracer.
//!
//! One `Telemetry` is built at startup and shared by `Arc` with every
//! handler; tests construct their own to observe it in isolation.

pub mod metrics;
pub mod trace;

use std::time::Duration;

pub use metrics::{HistogramSnapshot, ServiceMetrics, TelemetrySnapshot};
pub use trace::{SpanHandle, Tracer, TracingGuard};

#[derive(Default)]
pub struct Telemetry {
    metrics: ServiceMetrics,
    tracer: Tracer,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    pub fn start_span(&self, name: &'static str) -> SpanHandle {
        self.tracer.start_span(name)
    }

    pub fn record_request(&self) {
        self.metrics.record_request();
    }

    pub fn record_latency(&self, elapsed: Duration) {
        self.metrics.record_latency(elapsed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }
}
