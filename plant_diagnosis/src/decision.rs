use crate::{
    catalog::{class_key, display_name},
    classifier::ClassProbabilities,
};
use serde::Serialize;
use thiserror::Error;

pub const LOW_CONFIDENCE_MESSAGE: &str = "Low confidence. Please try a clearer image.";
pub const CONFIDENT_MESSAGE: &str = "Prediction successful";
pub const SERVER_ERROR_MESSAGE: &str = "Server error occurred. Please try again later.";

#[derive(Error, Debug, PartialEq)]
pub enum DecisionError {
    #[error("Classifier returned an empty probability vector")]
    EmptyProbabilities,
    #[error("Class index {0} is outside the catalog")]
    UnknownClass(usize),
    #[error("Expected {expected} probabilities, got {got}")]
    WidthMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Confident,
    LowConfidence,
    Rejected,
    ServerError,
}

/// Final record handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub outcome: Outcome,
    /// Display form of the predicted class.
    pub class_name: Option<String>,
    /// Raw catalog entry, the key for advisory lookups.
    pub class_key: Option<&'static str>,
    pub confidence: Option<f32>,
    pub rejection_reason: Option<String>,
    pub message: String,
}

impl PredictionResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            outcome: Outcome::Rejected,
            class_name: None,
            class_key: None,
            confidence: None,
            message: reason.clone(),
            rejection_reason: Some(reason),
        }
    }

    pub fn server_error() -> Self {
        Self {
            outcome: Outcome::ServerError,
            class_name: None,
            class_key: None,
            confidence: None,
            rejection_reason: None,
            message: SERVER_ERROR_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    min_confidence: f32,
}

impl DecisionPolicy {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Never rejects: a low score still reports the best guess, flagged as uncertain.
    pub fn decide(&self, probs: &ClassProbabilities) -> Result<PredictionResult, DecisionError> {
        let (index, confidence) = probs.argmax().ok_or(DecisionError::EmptyProbabilities)?;
        let key = class_key(index).ok_or(DecisionError::UnknownClass(index))?;

        let (outcome, message) = if confidence < self.min_confidence {
            (Outcome::LowConfidence, LOW_CONFIDENCE_MESSAGE)
        } else {
            (Outcome::Confident, CONFIDENT_MESSAGE)
        };

        Ok(PredictionResult {
            outcome,
            class_name: Some(display_name(key)),
            class_key: Some(key),
            confidence: Some(confidence),
            rejection_reason: None,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::new(0.70)
    }

    #[test]
    fn test_low_confidence_keeps_best_guess() {
        let mut values = vec![0.05_f32; 14];
        values.push(0.30);
        let result = policy().decide(&ClassProbabilities::new(values)).unwrap();

        assert_eq!(result.outcome, Outcome::LowConfidence);
        assert_eq!(result.class_name.as_deref(), Some("Tomato Healthy"));
        assert_eq!(result.class_key, Some("Tomato_healthy"));
        assert_eq!(result.confidence, Some(0.30));
        assert_eq!(result.message, LOW_CONFIDENCE_MESSAGE);
        assert_eq!(result.rejection_reason, None);
    }

    #[test]
    fn test_confident_prediction() {
        let mut values = vec![0.05 / 14.0_f32; 15];
        values[3] = 0.95;
        let result = policy().decide(&ClassProbabilities::new(values)).unwrap();

        assert_eq!(result.outcome, Outcome::Confident);
        assert_eq!(result.confidence, Some(0.95));
        assert_eq!(result.class_name.as_deref(), Some("Potato   Late Blight"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut values = vec![0.3 / 14.0_f32; 15];
        values[0] = 0.70;
        let result = policy().decide(&ClassProbabilities::new(values)).unwrap();
        assert_eq!(result.outcome, Outcome::Confident);
    }

    #[test]
    fn test_empty_and_out_of_catalog() {
        assert_eq!(
            policy().decide(&ClassProbabilities::new(vec![])),
            Err(DecisionError::EmptyProbabilities)
        );

        let mut values = vec![0.0_f32; 16];
        values[15] = 1.0;
        assert_eq!(
            policy().decide(&ClassProbabilities::new(values)),
            Err(DecisionError::UnknownClass(15))
        );
    }
}
