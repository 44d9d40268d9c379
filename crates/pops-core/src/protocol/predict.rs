//! Predict request/response shapes.
//!
//! Two request shapes are accepted: text embedded in the URL path, or a JSON
//! body `{"text": "..."}`. `PredictInput` makes the choice explicit and
//! `PredictInput::normalize` resolves it into one `ClassificationRequest`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PopsError;

/// Canonical text used when neither the path nor the body carries any.
///
/// Kept for compatibility with existing clients; missing input is classified
/// rather than rejected.
pub const NO_TEXT_SENTINEL: &str = "No text provided";

/// JSON body accepted by `POST /predict`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextInput {
    pub text: String,
}

/// Raw request input before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictInput {
    /// Text taken from `/predict/{text}` (already percent-decoded).
    FromPath(String),
    /// Parsed JSON body.
    FromBody(TextInput),
    /// No usable input at all.
    Neither,
}

impl PredictInput {
    /// Build from the optional pieces an HTTP layer can extract.
    ///
    /// A non-empty path value takes precedence over any body.
    pub fn from_parts(path: Option<String>, body: Option<TextInput>) -> Self {
        match (path, body) {
            (Some(p), _) if !p.is_empty() => PredictInput::FromPath(p),
            (_, Some(b)) => PredictInput::FromBody(b),
            _ => PredictInput::Neither,
        }
    }

    /// Resolve into the canonical request. Never fails.
    pub fn normalize(self) -> ClassificationRequest {
        let text = match self {
            PredictInput::FromPath(t) if !t.is_empty() => t,
            PredictInput::FromBody(TextInput { text }) if !text.is_empty() => text,
            _ => NO_TEXT_SENTINEL.to_string(),
        };
        ClassificationRequest { text }
    }
}

/// Canonical, non-empty input for one classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub text: String,
}

/// Classifier label. The set is open and defined by the loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub const POSITIVE: &'static str = "POSITIVE";
    pub const NEGATIVE: &'static str = "NEGATIVE";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful classification, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub text: String,
    #[serde(rename = "sentiment")]
    pub label: Label,
    pub confidence: f64,
}

/// Body of every `/predict` response: exactly one of result or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Success(ClassificationResult),
    Error { error: String },
}

impl PredictResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, PredictResponse::Success(_))
    }
}

impl From<crate::Result<ClassificationResult>> for PredictResponse {
    fn from(res: crate::Result<ClassificationResult>) -> Self {
        match res {
            Ok(r) => PredictResponse::Success(r),
            Err(e) => PredictResponse::from(&e),
        }
    }
}

impl From<&PopsError> for PredictResponse {
    fn from(e: &PopsError) -> Self {
        PredictResponse::Error {
            error: e.client_message().to_string(),
        }
    }
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootStatus {
    pub message: String,
    pub model_status: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn path_wins_over_body() {
        let input = PredictInput::from_parts(
            Some("from path".into()),
            Some(TextInput { text: "from body".into() }),
        );
        assert_eq!(input.normalize().text, "from path");
    }

    #[test]
    fn empty_path_falls_back_to_body() {
        let input = PredictInput::from_parts(Some(String::new()), Some(TextInput { text: "b".into() }));
        assert_eq!(input, PredictInput::FromBody(TextInput { text: "b".into() }));
        assert_eq!(input.normalize().text, "b");
    }

    #[test]
    fn nothing_yields_sentinel() {
        assert_eq!(PredictInput::from_parts(None, None).normalize().text, NO_TEXT_SENTINEL);
        let empty_body = PredictInput::FromBody(TextInput { text: String::new() });
        assert_eq!(empty_body.normalize().text, NO_TEXT_SENTINEL);
    }

    #[test]
    fn untagged_response_shapes() {
        let ok = PredictResponse::Success(ClassificationResult {
            text: "t".into(),
            label: Label::new(Label::POSITIVE),
            confidence: 0.5,
        });
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["sentiment"], "POSITIVE");
        assert!(v.get("error").is_none());

        let err = PredictResponse::from(&PopsError::ModelUnavailable);
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v, serde_json::json!({ "error": crate::error::MODEL_NOT_LOADED_MSG }));
    }
}
