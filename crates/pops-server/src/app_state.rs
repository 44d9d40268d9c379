//! Shared application state for the pOps service.
//!
//! Model guard and telemetry are constructed once at startup and injected
//! here; handlers only ever see them through `AppState`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::inference::InferenceHandler;
use crate::model::ModelGuard;
use crate::obs::Telemetry;

/// Message reported by `GET /`.
pub const SERVICE_MESSAGE: &str = "pOps Sentiment Analysis Service";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    model: Arc<ModelGuard>,
    telemetry: Arc<Telemetry>,
    inference: InferenceHandler,
}

struct AppStateInner {
    draining: AtomicBool,
}

impl AppState {
    pub fn new(model: Arc<ModelGuard>, telemetry: Arc<Telemetry>) -> Self {
        let inference = InferenceHandler::new(Arc::clone(&model), Arc::clone(&telemetry));
        Self {
            inner: Arc::new(AppStateInner {
                draining: AtomicBool::new(false),
            }),
            model,
            telemetry,
            inference,
        }
    }

    pub fn model(&self) -> &ModelGuard {
        &self.model
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn inference(&self) -> &InferenceHandler {
        &self.inference
    }

    /// Mark draining state (shutdown in progress).
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Gauge lines appended to `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, &'static str, u64)> {
        vec![
            ("pops_model_loaded", "1 when the classifier is loaded", u64::from(self.model.is_loaded())),
            ("pops_draining", "1 while the server is shutting down", u64::from(self.is_draining())),
        ]
    }
}
