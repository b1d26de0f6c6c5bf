use crate::preprocess::Tensor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Model output '{0}' missing from session outputs")]
    MissingOutput(String),
    #[error("Model produces {got} classes, catalog expects {expected}")]
    OutputShapeMismatch { expected: usize, got: usize },
    #[error("Session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("Model produced no logits")]
    EmptyOutput,
}

/// A frozen multi-class classifier. Implementations are shared read-only
/// across requests once loaded.
pub trait ClassifierPort: Send + Sync + 'static {
    fn classify(&self, tensor: &Tensor) -> Result<ClassProbabilities, ClassifierError>;
}

/// Softmax output, one entry per catalog index.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<f32>);

impl ClassProbabilities {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn from_logits(logits: &[f32]) -> Self {
        Self(softmax(logits))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index and value of the highest probability; ties go to the lowest index.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        self.0
            .iter()
            .copied()
            .enumerate()
            .reduce(|best, current| if current.1 > best.1 { current } else { best })
    }
}

fn softmax(data: &[f32]) -> Vec<f32> {
    let max_val = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = data.iter().map(|&x| (x - max_val).exp()).collect();
    let sum_exps: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum_exps).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = ClassProbabilities::from_logits(&[1.0, 2.0, 3.0, -4.0, 1000.0]);
        let sum: f32 = probs.as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.as_slice().iter().all(|p| *p >= 0.0));
        assert_eq!(probs.argmax().map(|(i, _)| i), Some(4));
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        let probs = ClassProbabilities::new(vec![0.1, 0.4, 0.4, 0.1]);
        assert_eq!(probs.argmax(), Some((1, 0.4)));
    }

    #[test]
    fn test_argmax_empty() {
        assert_eq!(ClassProbabilities::new(vec![]).argmax(), None);
    }
}
