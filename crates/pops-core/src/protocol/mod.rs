//! Wire-level protocol definitions.
//!
//! - `predict`: request shapes, the input normalizer, and response payloads.

pub mod predict;

pub use predict::{
    ClassificationRequest, ClassificationResult, Label, PredictInput, PredictResponse,
    RootStatus, TextInput, NO_TEXT_SENTINEL,
};
