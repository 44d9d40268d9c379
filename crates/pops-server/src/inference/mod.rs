//! Inference handler: one request from span open to span close.
//!
//! Flow: open span → normalize input → classify through the model guard →
//! record telemetry → end span. Request-level errors are absorbed here and
//! turned into `{"error": ...}`; nothing escapes to the HTTP layer.
//!
//! Telemetry rules:
//! - `ModelUnavailable` short-circuits before classification and is not
//!   counted in `inference_requests_total` nor observed in the histogram.
//! - Any request that reached the classifier (success or `InferenceFailed`)
//!   increments the counter once and observes its latency once.

use std::sync::Arc;

use tracing::Instrument;

use pops_core::error::{PopsError, Result};
use pops_core::protocol::{ClassificationResult, PredictInput, PredictResponse};

use crate::model::ModelGuard;
use crate::obs::Telemetry;

/// Name of the span opened for every predict request.
pub const INFERENCE_SPAN: &str = "inference-span";

#[derive(Clone)]
pub struct InferenceHandler {
    model: Arc<ModelGuard>,
    telemetry: Arc<Telemetry>,
}

impl InferenceHandler {
    pub fn new(model: Arc<ModelGuard>, telemetry: Arc<Telemetry>) -> Self {
        Self { model, telemetry }
    }

    /// Serve one predict request. Always returns exactly one payload.
    pub async fn handle(&self, input: PredictInput) -> PredictResponse {
        let span = self.telemetry.start_span(INFERENCE_SPAN);
        let res = self.run(input).instrument(span.span().clone()).await;
        span.record_result(&res);
        span.end();
        PredictResponse::from(res)
    }

    async fn run(&self, input: PredictInput) -> Result<ClassificationResult> {
        let started = std::time::Instant::now();
        let req = input.normalize();

        if !self.model.is_loaded() {
            tracing::warn!("predict rejected: model not loaded");
            self.telemetry.metrics().record_error(PopsError::ModelUnavailable.kind().as_str());
            return Err(PopsError::ModelUnavailable);
        }

        let res = self.model.classify(&req.text).await;
        let elapsed = started.elapsed();

        self.telemetry.record_request();
        self.telemetry.record_latency(elapsed);

        match &res {
            Ok(r) => tracing::debug!(
                sentiment = %r.label,
                confidence = r.confidence,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "inference ok"
            ),
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind().as_str(), "inference error");
                self.telemetry.metrics().record_error(e.kind().as_str());
            }
        }
        res
    }
}
