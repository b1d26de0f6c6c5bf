mod ort_service;

pub mod catalog;
pub mod classifier;
pub mod decision;
pub mod pipeline;
pub mod preprocess;
pub mod settings;
pub mod validator;

pub use catalog::CLASS_NAMES;
pub use classifier::{ClassProbabilities, ClassifierError, ClassifierPort};
pub use decision::{DecisionPolicy, Outcome, PredictionResult};
pub use ort_service::OrtClassifier;
pub use pipeline::{Diagnose, InferencePipeline};
pub use preprocess::{Preprocessor, Tensor};
pub use settings::{DiagnosisSettings, ExecutionProvider, ModelSettings};
pub use validator::{ImageValidator, RejectionReason, ValidationVerdict};
