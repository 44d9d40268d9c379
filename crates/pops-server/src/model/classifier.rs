//! Classifier capability as seen by the model guard.

use async_trait::async_trait;

use pops_core::error::{PopsError, Result};
use pops_core::protocol::Label;

/// Raw model output for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: Label::new(label),
            confidence,
        }
    }

    /// Reject outputs that must never reach a client.
    pub fn validate(&self) -> Result<()> {
        if self.label.as_str().is_empty() {
            return Err(PopsError::InferenceFailed("model returned an empty label".into()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(PopsError::InferenceFailed(format!(
                "model returned confidence out of range: {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// A loaded, read-only classification model.
///
/// Implementations are shared across concurrent requests without locking.
/// CPU-heavy backends should move work off the async executor themselves
/// (e.g. `tokio::task::spawn_blocking`).
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Model identifier (for logs and span fields).
    fn id(&self) -> &str;

    /// Labels this model can emit.
    fn labels(&self) -> Vec<Label>;

    async fn classify(&self, text: &str) -> Result<Prediction>;
}
