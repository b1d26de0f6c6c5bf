use crate::{
    catalog,
    classifier::{ClassifierError, ClassifierPort},
    decision::{DecisionError, DecisionPolicy, PredictionResult},
    preprocess::{PreprocessError, Preprocessor},
    settings::DiagnosisSettings,
    validator::ImageValidator,
};
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Decision failed: {0}")]
    Decision(#[from] DecisionError),
}

/// The one capability the presentation layer depends on.
pub trait Diagnose: Send + Sync + 'static {
    fn run(&self, path: &Path) -> PredictionResult;
}

pub struct InferencePipeline<C: ClassifierPort> {
    validator: ImageValidator,
    preprocessor: Preprocessor,
    classifier: Arc<C>,
    policy: DecisionPolicy,
}

impl<C: ClassifierPort> InferencePipeline<C> {
    pub fn new(classifier: Arc<C>, settings: &DiagnosisSettings) -> Self {
        Self {
            validator: ImageValidator::new(settings),
            preprocessor: Preprocessor::new(settings.img_size),
            classifier,
            policy: DecisionPolicy::new(settings.min_confidence),
        }
    }

    fn infer(&self, path: &Path) -> Result<PredictionResult, PipelineError> {
        let tensor = self.preprocessor.prepare(path)?;
        let probs = self.classifier.classify(&tensor)?;
        drop(tensor);

        if probs.len() != catalog::class_count() {
            return Err(DecisionError::WidthMismatch {
                expected: catalog::class_count(),
                got: probs.len(),
            }
            .into());
        }

        Ok(self.policy.decide(&probs)?)
    }
}

impl<C: ClassifierPort> Diagnose for InferencePipeline<C> {
    fn run(&self, path: &Path) -> PredictionResult {
        let verdict = self.validator.validate(path);
        if !verdict.accepted {
            tracing::info!("Image rejected: {}", verdict.reason);
            return PredictionResult::rejected(verdict.reason);
        }

        match self.infer(path) {
            Ok(result) => {
                tracing::info!(
                    outcome = ?result.outcome,
                    class = result.class_key.unwrap_or_default(),
                    confidence = result.confidence.unwrap_or_default(),
                    "Prediction complete"
                );
                result
            }
            Err(e) => {
                tracing::error!("Failed to process validated image {:?}: {}", path, e);
                PredictionResult::server_error()
            }
        }
    }
}
