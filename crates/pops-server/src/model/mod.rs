//! Model guard: owns the singleton classifier and its load state.
//!
//! The state is written exactly once by `ModelGuard::initialize` before the
//! listener binds, then only read. A failed load is recorded as a permanent
//! degraded state; requests fail fast with `ModelUnavailable` while the rest
//! of the service keeps answering.

pub mod classifier;
pub mod lexicon;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;

use pops_core::error::{PopsError, Result};
use pops_core::protocol::ClassificationResult;

use crate::config::ModelSection;

pub use classifier::{Classifier, Prediction};
pub use lexicon::LexiconClassifier;

/// Identifier of the built-in lexicon backend.
pub const LEXICON_MODEL_ID: &str = "lexicon-sentiment";

/// Load state of the process-wide model.
pub enum ModelState {
    Unloaded,
    Loaded(Arc<dyn Classifier>),
    FailedToLoad(String),
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Unloaded => f.write_str("Unloaded"),
            ModelState::Loaded(m) => f.debug_tuple("Loaded").field(&m.id()).finish(),
            ModelState::FailedToLoad(r) => f.debug_tuple("FailedToLoad").field(r).finish(),
        }
    }
}

static UNLOADED: ModelState = ModelState::Unloaded;

/// Constructs the classifier named by the model config section.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, cfg: &ModelSection) -> Result<Arc<dyn Classifier>>;
}

/// Resolves the backends compiled into this binary.
#[derive(Debug, Default)]
pub struct BuiltinLoader;

#[async_trait]
impl ModelLoader for BuiltinLoader {
    async fn load(&self, cfg: &ModelSection) -> Result<Arc<dyn Classifier>> {
        match cfg.id.as_str() {
            LEXICON_MODEL_ID => Ok(Arc::new(LexiconClassifier::new(cfg.id.clone()))),
            other => Err(PopsError::ModelLoad(format!("unknown model id: {other}"))),
        }
    }
}

#[derive(Default)]
pub struct ModelGuard {
    state: OnceLock<ModelState>,
}

impl ModelGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that starts out `Loaded` with the given classifier.
    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        let guard = Self::new();
        let _ = guard.state.set(ModelState::Loaded(classifier));
        guard
    }

    /// Guard that starts out in the degraded `FailedToLoad` state.
    pub fn failed(reason: impl Into<String>) -> Self {
        let guard = Self::new();
        let _ = guard.state.set(ModelState::FailedToLoad(reason.into()));
        guard
    }

    /// Load the model once, bounded by `cfg.load_timeout_ms`.
    ///
    /// Never fails: errors, panics and timeouts become `FailedToLoad`. Calls
    /// after the first are ignored.
    pub async fn initialize(&self, loader: &dyn ModelLoader, cfg: &ModelSection) -> &ModelState {
        if self.state.get().is_some() {
            tracing::warn!(model = %cfg.id, "model already initialized, ignoring");
            return self.state();
        }

        tracing::info!(
            model = %cfg.id,
            timeout_ms = cfg.load_timeout_ms,
            "loading model (this may take a while)"
        );
        let started = Instant::now();
        let load = AssertUnwindSafe(loader.load(cfg)).catch_unwind();

        let next = match tokio::time::timeout(cfg.load_timeout(), load).await {
            Ok(Ok(Ok(classifier))) => {
                tracing::info!(
                    model = %classifier.id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model loaded"
                );
                ModelState::Loaded(classifier)
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(model = %cfg.id, error = %e, "model load failed, serving degraded");
                ModelState::FailedToLoad(e.to_string())
            }
            Ok(Err(panic)) => {
                let reason = format!("loader panicked: {}", panic_message(panic));
                tracing::error!(model = %cfg.id, error = %reason, "model load failed, serving degraded");
                ModelState::FailedToLoad(reason)
            }
            Err(_) => {
                let reason = format!("load timed out after {}ms", cfg.load_timeout_ms);
                tracing::error!(model = %cfg.id, error = %reason, "model load failed, serving degraded");
                ModelState::FailedToLoad(reason)
            }
        };

        if self.state.set(next).is_err() {
            tracing::warn!(model = %cfg.id, "concurrent model initialization, keeping first result");
        }
        self.state()
    }

    pub fn state(&self) -> &ModelState {
        self.state.get().unwrap_or(&UNLOADED)
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    /// `"loaded"` / `"not loaded"`, as reported by `GET /`.
    pub fn status(&self) -> &'static str {
        if self.is_loaded() {
            "loaded"
        } else {
            "not loaded"
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        match self.state() {
            ModelState::Loaded(m) => Some(m.id()),
            _ => None,
        }
    }

    /// Classify `text` with the loaded model. No retries.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let ModelState::Loaded(model) = self.state() else {
            return Err(PopsError::ModelUnavailable);
        };

        let prediction = AssertUnwindSafe(model.classify(text))
            .catch_unwind()
            .await
            .map_err(|p| PopsError::InferenceFailed(format!("model panicked: {}", panic_message(p))))?
            .map_err(|e| match e {
                PopsError::InferenceFailed(_) => e,
                other => PopsError::InferenceFailed(other.to_string()),
            })?;
        prediction.validate()?;

        Ok(ClassificationResult {
            text: text.to_string(),
            label: prediction.label,
            confidence: prediction.confidence,
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
