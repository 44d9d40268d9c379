//! Lexicon sentiment model.
//!
//! Scores tokens against fixed positive/negative word lists. A negator flips
//! the polarity of the next sentiment word within a short window, an
//! intensifier scales it. The net score goes through a logistic curve, so a
//! single clear sentiment word lands around 0.95 confidence. Deterministic.

use std::collections::HashSet;

use async_trait::async_trait;

use pops_core::error::Result;
use pops_core::protocol::Label;

use super::classifier::{Classifier, Prediction};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "awesome", "love", "loved", "loves", "like",
    "liked", "nice", "happy", "fantastic", "wonderful", "best", "perfect", "brilliant",
    "enjoy", "enjoyed", "recommend", "pleased", "delightful", "superb", "fast", "reliable",
    "beautiful", "glad", "impressive", "outstanding", "positive", "helpful", "smooth",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "hate", "hated", "hates", "poor", "worst",
    "broken", "sad", "angry", "disappointing", "disappointed", "slow", "useless", "boring",
    "ugly", "annoying", "fail", "failed", "fails", "failure", "problem", "bug", "buggy",
    "crash", "crashed", "refund", "waste", "negative", "unreliable", "mediocre",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "nothing", "hardly", "dont", "don't", "isnt", "isn't", "wasnt",
    "wasn't", "doesnt", "doesn't", "didnt", "didn't", "cant", "can't", "wont", "won't",
];

const INTENSIFIERS: &[&str] = &["very", "really", "extremely", "so", "super", "incredibly"];

/// Tokens a negator stays active for.
const NEGATION_WINDOW: usize = 3;
const INTENSIFIER_WEIGHT: f64 = 1.5;
/// Logistic steepness; `sigmoid(3.0) ~= 0.953`.
const STEEPNESS: f64 = 3.0;

pub struct LexiconClassifier {
    id: String,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negators: HashSet<&'static str>,
    intensifiers: HashSet<&'static str>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(super::LEXICON_MODEL_ID)
    }
}

impl LexiconClassifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negators: NEGATORS.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    /// Net polarity of `text` (positive > 0).
    pub fn score(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let mut score = 0.0;
        let mut negate_for = 0usize;
        let mut weight = 1.0;

        for token in lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
        {
            if self.negators.contains(token) {
                negate_for = NEGATION_WINDOW;
                continue;
            }
            if self.intensifiers.contains(token) {
                weight = INTENSIFIER_WEIGHT;
                continue;
            }

            let polarity = if self.positive.contains(token) {
                1.0
            } else if self.negative.contains(token) {
                -1.0
            } else {
                negate_for = negate_for.saturating_sub(1);
                weight = 1.0;
                continue;
            };

            let sign = if negate_for > 0 { -1.0 } else { 1.0 };
            score += polarity * weight * sign;
            negate_for = 0;
            weight = 1.0;
        }

        score
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn labels(&self) -> Vec<Label> {
        vec![Label::new(Label::POSITIVE), Label::new(Label::NEGATIVE)]
    }

    async fn classify(&self, text: &str) -> Result<Prediction> {
        let score = self.score(text);
        let confidence = 1.0 / (1.0 + (-STEEPNESS * score.abs()).exp());
        let label = if score >= 0.0 { Label::POSITIVE } else { Label::NEGATIVE };
        Ok(Prediction::new(label, confidence))
    }
}
